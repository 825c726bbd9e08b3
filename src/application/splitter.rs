use crate::domain::cart::CartLine;
use crate::domain::ids::{ProductId, VendorId};
use crate::error::{FulfillmentError, Result};
use std::collections::BTreeMap;

/// Which bucket a checkout targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Vendor(VendorId),
    /// Lines whose product no longer resolves. Never checkout-able.
    Unavailable,
}

/// Cart lines partitioned by the vendor that owns each product.
///
/// Every input line lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorBuckets {
    by_vendor: BTreeMap<VendorId, Vec<CartLine>>,
    unavailable: Vec<CartLine>,
}

/// Groups cart lines by vendor.
pub struct VendorSplitter;

impl VendorSplitter {
    /// `vendor_of` resolves a product to its owning vendor, or `None` if the
    /// product is unknown or deleted.
    pub fn split<F>(lines: &[CartLine], vendor_of: F) -> VendorBuckets
    where
        F: Fn(&ProductId) -> Option<VendorId>,
    {
        let mut buckets = VendorBuckets::default();
        for line in lines {
            match vendor_of(line.product_id()) {
                Some(vendor_id) => buckets
                    .by_vendor
                    .entry(vendor_id)
                    .or_default()
                    .push(line.clone()),
                None => buckets.unavailable.push(line.clone()),
            }
        }
        buckets
    }
}

impl VendorBuckets {
    pub fn vendor(&self, vendor_id: &VendorId) -> &[CartLine] {
        self.by_vendor
            .get(vendor_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unavailable(&self) -> &[CartLine] {
        &self.unavailable
    }

    pub fn vendors(&self) -> impl Iterator<Item = &VendorId> {
        self.by_vendor.keys()
    }

    pub fn get(&self, key: &BucketKey) -> &[CartLine] {
        match key {
            BucketKey::Vendor(vendor_id) => self.vendor(vendor_id),
            BucketKey::Unavailable => &self.unavailable,
        }
    }

    /// Buckets a checkout should process, in vendor-id order.
    ///
    /// `None` selects every vendor bucket (one order per vendor). Unavailable
    /// lines are left behind unless they are all the cart holds.
    pub fn select_for_checkout(
        &self,
        target: Option<&BucketKey>,
    ) -> Result<Vec<(VendorId, Vec<CartLine>)>> {
        match target {
            Some(BucketKey::Unavailable) => Err(self.unavailable_error()),
            Some(BucketKey::Vendor(vendor_id)) => match self.by_vendor.get(vendor_id) {
                Some(lines) if !lines.is_empty() => Ok(vec![(vendor_id.clone(), lines.clone())]),
                _ => Err(FulfillmentError::EmptySelection),
            },
            None if self.by_vendor.is_empty() => {
                if self.unavailable.is_empty() {
                    Err(FulfillmentError::EmptySelection)
                } else {
                    Err(self.unavailable_error())
                }
            }
            None => Ok(self
                .by_vendor
                .iter()
                .map(|(vendor_id, lines)| (vendor_id.clone(), lines.clone()))
                .collect()),
        }
    }

    fn unavailable_error(&self) -> FulfillmentError {
        match self.unavailable.first() {
            Some(line) => FulfillmentError::ProductUnavailable {
                product_id: line.product_id().clone(),
            },
            None => FulfillmentError::EmptySelection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn vendor_of(product_id: &ProductId) -> Option<VendorId> {
        match product_id.as_str() {
            "p1" | "p3" => Some(VendorId::from("v1")),
            "p2" => Some(VendorId::from("v2")),
            _ => None,
        }
    }

    fn cart() -> Vec<CartLine> {
        vec![
            CartLine::new("p1", 2).unwrap(),
            CartLine::new("p2", 1).unwrap(),
            CartLine::new("p3", 4).unwrap(),
            CartLine::new("gone", 1).unwrap(),
        ]
    }

    #[test]
    fn test_split_is_a_partition() {
        let input = cart();
        let buckets = VendorSplitter::split(&input, vendor_of);

        let mut seen = Vec::new();
        for vendor_id in buckets.vendors() {
            seen.extend(buckets.vendor(vendor_id).iter().cloned());
        }
        seen.extend(buckets.unavailable().iter().cloned());

        assert_eq!(seen.len(), input.len());
        let seen: HashSet<_> = seen.into_iter().collect();
        let input: HashSet<_> = input.into_iter().collect();
        assert_eq!(seen, input);
        assert_eq!(buckets.vendor(&VendorId::from("v1")).len(), 2);
        assert_eq!(buckets.unavailable().len(), 1);
    }

    #[test]
    fn test_select_single_vendor() {
        let buckets = VendorSplitter::split(&cart(), vendor_of);
        let selected = buckets
            .select_for_checkout(Some(&BucketKey::Vendor(VendorId::from("v2"))))
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, VendorId::from("v2"));
        assert_eq!(selected[0].1, vec![CartLine::new("p2", 1).unwrap()]);
    }

    #[test]
    fn test_select_all_skips_unavailable() {
        let buckets = VendorSplitter::split(&cart(), vendor_of);
        let selected = buckets.select_for_checkout(None).unwrap();
        let vendors: Vec<_> = selected.iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(vendors, vec!["v1", "v2"]);
    }

    #[test]
    fn test_select_unknown_vendor_is_empty() {
        let buckets = VendorSplitter::split(&cart(), vendor_of);
        assert!(matches!(
            buckets.select_for_checkout(Some(&BucketKey::Vendor(VendorId::from("v9")))),
            Err(FulfillmentError::EmptySelection)
        ));
    }

    #[test]
    fn test_unavailable_bucket_cannot_be_checked_out() {
        let buckets = VendorSplitter::split(&cart(), vendor_of);
        assert!(matches!(
            buckets.select_for_checkout(Some(&BucketKey::Unavailable)),
            Err(FulfillmentError::ProductUnavailable { product_id }) if product_id.as_str() == "gone"
        ));

        let only_gone = VendorSplitter::split(&[CartLine::new("gone", 1).unwrap()], vendor_of);
        assert!(matches!(
            only_gone.select_for_checkout(None),
            Err(FulfillmentError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_cart() {
        let buckets = VendorSplitter::split(&[], vendor_of);
        assert!(matches!(
            buckets.select_for_checkout(None),
            Err(FulfillmentError::EmptySelection)
        ));
    }
}
