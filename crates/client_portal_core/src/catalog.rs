//! The fixed catalog of document types offered per category.

use crate::domain::DocumentCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub category: DocumentCategory,
    pub name: &'static str,
    pub types: &'static [&'static str],
}

static CATALOG: [CategorySpec; 2] = [
    CategorySpec {
        category: DocumentCategory::IncomeTax,
        name: "Section 1 – Income Tax (Financial Year wise)",
        types: &[
            "Income Tax Return Acknowledgement",
            "Income Tax Computation",
            "Balance Sheet",
            "Profit and Loss Account",
            "Annexures",
            "Audit Report",
            "Director Report",
            "Others",
        ],
    },
    CategorySpec {
        category: DocumentCategory::Gst,
        name: "Section 2 – GST (Financial Year wise)",
        types: &["GSTR3B", "GSTR1", "Others"],
    },
];

pub fn document_catalog() -> &'static [CategorySpec] {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_categories_are_listed() {
        let catalog = document_catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].types.len(), 8);
        assert_eq!(catalog[1].types, ["GSTR3B", "GSTR1", "Others"]);
    }
}
