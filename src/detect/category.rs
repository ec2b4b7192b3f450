use std::collections::{BTreeSet, HashMap};

use super::AnomalyCategory;

/// Maps raw detector labels onto anomaly categories.
///
/// The table is fixed at construction. Every category the mapper can return
/// is interned once, so clones of the same category share one allocation.
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    labels: HashMap<String, AnomalyCategory>,
    categories: BTreeSet<AnomalyCategory>,
}

impl CategoryMapper {
    pub fn new<I, L, C>(table: I) -> Self
    where
        I: IntoIterator<Item = (L, C)>,
        L: Into<String>,
        C: AsRef<str>,
    {
        let mut categories: BTreeSet<AnomalyCategory> = BTreeSet::new();
        let mut labels = HashMap::new();

        for (label, category) in table {
            let name = category.as_ref();
            let interned = match categories.iter().find(|c| c.as_str() == name) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = AnomalyCategory::new(name);
                    categories.insert(fresh.clone());
                    fresh
                }
            };
            labels.insert(label.into(), interned);
        }

        Self { labels, categories }
    }

    /// Category for a raw label, or `None` when the label is not tracked.
    pub fn map(&self, raw_label: &str) -> Option<AnomalyCategory> {
        self.labels.get(raw_label).cloned()
    }

    /// Look up a category by its own name.
    pub fn category(&self, name: &str) -> Option<AnomalyCategory> {
        self.categories.iter().find(|c| c.as_str() == name).cloned()
    }

    /// The fixed set of categories this mapper can produce, sorted by name.
    pub fn categories(&self) -> impl Iterator<Item = &AnomalyCategory> {
        self.categories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> CategoryMapper {
        CategoryMapper::new([
            ("person", "theft"),
            ("knife", "weapon"),
            ("scissors", "weapon"),
            ("fire hydrant", "fire"),
        ])
    }

    #[test]
    fn test_maps_known_labels() {
        let m = mapper();
        assert_eq!(m.map("person").unwrap(), "theft");
        assert_eq!(m.map("fire hydrant").unwrap(), "fire");
    }

    #[test]
    fn test_unknown_label_has_no_mapping() {
        assert!(mapper().map("giraffe").is_none());
        assert!(mapper().map("").is_none());
    }

    #[test]
    fn test_labels_sharing_a_category_share_storage() {
        let m = mapper();
        let a = m.map("knife").unwrap();
        let b = m.map("scissors").unwrap();
        assert_eq!(a, b);
        assert!(std::sync::Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_category_set() {
        let m = mapper();
        let names: Vec<&str> = m.categories().map(AnomalyCategory::as_str).collect();
        assert_eq!(names, vec!["fire", "theft", "weapon"]);
        assert!(m.category("weapon").is_some());
        assert!(m.category("knife").is_none());
    }
}
