use crate::record::{fields, ProcessRecord};

/// Post-hoc filter over fetched records: case- and accent-insensitive substring match.
///
/// Without a field, a record matches when either its origin or destination
/// department contains the needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    field: Option<String>,
    needle: String,
}

impl RecordFilter {
    /// Matches departments (origin or destination).
    pub fn department(needle: &str) -> Self {
        Self {
            field: None,
            needle: fold_text(needle.trim()),
        }
    }

    pub fn field(field: impl Into<String>, needle: &str) -> Self {
        Self {
            field: Some(field.into()),
            needle: fold_text(needle.trim()),
        }
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let hit = |name: &str| {
            record
                .get(name)
                .is_some_and(|value| fold_text(value).contains(&self.needle))
        };
        match &self.field {
            Some(field) => hit(field.as_str()),
            None => hit(fields::ORIGIN) || hit(fields::DESTINATION),
        }
    }

    pub fn apply(&self, records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Lowercases and converts letters with accents to letters without accents,
/// so "Fiscalização" and "fiscalizacao" compare equal.
#[inline]
pub fn fold_text(text: &str) -> String {
    text.to_lowercase()
        .replace(['á', 'à', 'â', 'ã', 'ä'], "a")
        .replace(['é', 'è', 'ê', 'ë'], "e")
        .replace(['í', 'ì', 'î', 'ï'], "i")
        .replace(['ó', 'ò', 'ô', 'õ', 'ö'], "o")
        .replace(['ú', 'ù', 'û', 'ü'], "u")
        .replace(['ý', 'ÿ'], "y")
        .replace(['ñ'], "n")
        .replace(['ç'], "c")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ProcessIdentifier;

    fn record(origin: &str, destination: &str, subject: &str) -> ProcessRecord {
        let id = ProcessIdentifier::new("018", 1, "2025").unwrap();
        ProcessRecord::with_header(&id, &[(fields::SUBJECT, subject.to_string())]).with_movement(&[
            (fields::ORIGIN, origin.to_string()),
            (fields::DESTINATION, destination.to_string()),
        ])
    }

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("Fiscalização de Obras"), "fiscalizacao de obras");
        assert_eq!(fold_text("SECRETARIA DE SAÚDE"), "secretaria de saude");
    }

    #[test]
    fn test_department_filter_checks_both_ends() {
        let filter = RecordFilter::department("fiscalizacao");
        assert!(filter.matches(&record("Fiscalização", "Gabinete", "x")));
        assert!(filter.matches(&record("Gabinete", "FISCALIZAÇÃO", "x")));
        assert!(!filter.matches(&record("Gabinete", "Protocolo", "fiscalização")));
    }

    #[test]
    fn test_field_filter() {
        let filter = RecordFilter::field(fields::SUBJECT, "Alvará");
        assert!(filter.matches(&record("a", "b", "Pedido de alvara")));
        assert!(!filter.matches(&record("alvará", "b", "Outro")));

        let filter = RecordFilter::field("no_such_field", "x");
        assert!(!filter.matches(&record("x", "x", "x")));
    }

    #[test]
    fn test_apply_can_leave_nothing() {
        let records = vec![record("A", "B", "s"), record("C", "Obras", "s")];
        assert_eq!(RecordFilter::department("obras").apply(records.clone()).len(), 1);
        assert!(RecordFilter::department("saude").apply(records.clone()).is_empty());
        assert_eq!(RecordFilter::department("  ").apply(records).len(), 2);
    }
}
