// src/formatting.rs

use crate::core::{field_order, Attachment, Colour, Field};

/// Text used in place of a missing error value.
pub const NIL_ERROR_TEXT: &str = "SendError called with nil error";

/// Builds an attachment with `short_fields` and `long_fields` in display order.
pub fn prepare_attachment(
    text: &str,
    colour: Colour,
    short_fields: &[(&str, &str)],
    long_fields: &[(&str, &str)],
) -> Attachment {
    let mut fields: Vec<Field> = short_fields
        .iter()
        .map(|(title, value)| Field::new(title, value, true))
        .chain(
            long_fields
                .iter()
                .map(|(title, value)| Field::new(title, value, false)),
        )
        .collect();
    fields.sort_by(field_order);

    Attachment {
        fallback: format!("Error: {}", text),
        text: text.to_string(),
        colour,
        fields,
    }
}

/// The attachment prepended to a batch when errors are piling up.
pub fn summary_attachment(dropped: u64) -> Attachment {
    let text = format!(
        "<!channel> Too many errors! {} error(s) were dropped since the last report.",
        dropped
    );
    Attachment {
        fallback: format!("Too many errors, {} dropped", dropped),
        text,
        colour: Colour::danger(),
        fields: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_attachment_orders_fields() {
        let attachment = prepare_attachment(
            "disk full",
            Colour::warning(),
            &[("Zone", "eu-1"), ("Host", "db1")],
            &[("Trace", "..."), ("Details", "/var is at 100%")],
        );

        assert_eq!(attachment.fallback, "Error: disk full");
        assert_eq!(attachment.text, "disk full");
        assert_eq!(attachment.colour, Colour::warning());
        let order: Vec<_> = attachment
            .fields
            .iter()
            .map(|f| (f.title.as_str(), f.short))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Host", true),
                ("Zone", true),
                ("Details", false),
                ("Trace", false)
            ]
        );
    }

    #[test]
    fn test_prepare_attachment_without_fields() {
        let attachment = prepare_attachment("hello", Colour::good(), &[], &[]);
        assert!(attachment.fields.is_empty());
    }

    #[test]
    fn test_summary_attachment_broadcasts_drop_count() {
        let summary = summary_attachment(17);
        assert_eq!(summary.colour, Colour::danger());
        assert!(summary.text.starts_with("<!channel>"));
        assert!(summary.text.contains("17"));
    }
}
