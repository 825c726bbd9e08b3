use crate::domain::order::Order;
use crate::domain::product::Product;
use crate::error::Result;
use std::io::Write;

/// Writes placed orders as CSV, one row per order in placement order.
///
/// Columns: `seq,reference,user,vendor,status,paid,subtotal,tax,shipping,total`.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders<'a, I>(&mut self, orders: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Order>,
    {
        self.writer.write_record([
            "seq",
            "reference",
            "user",
            "vendor",
            "status",
            "paid",
            "subtotal",
            "tax",
            "shipping",
            "total",
        ])?;
        for (index, order) in orders.into_iter().enumerate() {
            self.writer.write_record([
                (index + 1).to_string(),
                order.reference().to_string(),
                order.user_id().to_string(),
                order.vendor_id().to_string(),
                order.status().to_string(),
                order.is_paid().to_string(),
                order.subtotal().to_string(),
                order.tax_amount().to_string(),
                order.shipping_cost().to_string(),
                order.total().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes catalog counters as CSV: `product,vendor,stock,sold,active`.
pub struct StockWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StockWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_products(&mut self, products: &[Product]) -> Result<()> {
        self.writer
            .write_record(["product", "vendor", "stock", "sold", "active"])?;
        for product in products {
            self.writer.write_record([
                product.id.to_string(),
                product.vendor_id.to_string(),
                product.stock.to_string(),
                product.sold.to_string(),
                product.active.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
