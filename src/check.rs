//! Offline validation of a config document (`macrodeck check`).

use crate::config::{self, LayoutConfig, Resolution};
use crate::layout::{compute_geometry, LayoutPolicy, Viewport};
use std::fmt::Write;

/// Outcome of checking one document
pub struct Report {
    pub text: String,
    pub ok: bool,
}

pub fn check_document(raw: &str, viewport: Viewport, policy: &LayoutPolicy) -> Report {
    let mut report = Report { text: String::new(), ok: true };

    match config::resolve(raw) {
        Err(e) => {
            report.ok = false;
            report.text.push_str(&format!("error: {}\n", e));
        }
        Ok(Resolution::Active(layout)) => check_layout(&mut report, "config", &layout, viewport, policy),
        Ok(Resolution::SelectionRequired(named)) => {
            let names = named.names();
            if named.is_empty() {
                report.ok = false;
                report.text.push_str("error: config list is empty\n");
            } else if names.is_empty() {
                report.ok = false;
                report.text.push_str("error: config list has no named entries\n");
            }
            if names.len() < named.len() {
                let _ = writeln!(
                    report.text,
                    "note: {} entries without a string `name` are not offered",
                    named.len() - names.len()
                );
            }
            for (index, name) in names {
                let Some(layout) = named.select_index(index) else { continue };
                if named.select(name).as_ref() != Some(&layout) {
                    let _ = writeln!(report.text, "note: selecting `{}` by name gets an earlier entry", name);
                }
                check_layout(&mut report, name, &layout, viewport, policy);
            }
        }
    }
    report
}

fn check_layout(report: &mut Report, label: &str, layout: &LayoutConfig, viewport: Viewport, policy: &LayoutPolicy) {
    match compute_geometry(layout, viewport, policy) {
        Ok(g) => {
            let _ = writeln!(
                report.text,
                "{}: {}x{} grid{}, {} buttons, cell {}x{}, button {}, padding {}",
                label,
                g.rows,
                g.cols,
                if g.flipped { " (rotated)" } else { "" },
                g.button_count,
                g.cell_width,
                g.cell_height,
                g.square_size,
                g.padding,
            );
        }
        Err(e) => {
            report.ok = false;
            let _ = writeln!(report.text, "{}: error: {}", label, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &str) -> Report {
        check_document(raw, Viewport::new(800, 480), &LayoutPolicy::default())
    }

    #[test]
    fn single_layout_reports_geometry() {
        let report = check(r#"{"size":"2x2","buttons":[{"macro":"a"},{"macro":"b"},{"macro":"c"}]}"#);
        assert!(report.ok);
        assert!(report.text.starts_with("config: 2x2 grid, 3 buttons"), "{}", report.text);
    }

    #[test]
    fn each_named_entry_is_checked() {
        let report = check(
            r#"[{"name":"Home","size":"1x1","buttons":[{"macro":"x"}]},{"name":"Work","size":"2-2","buttons":[]},{"size":"1x1"}]"#,
        );
        assert!(!report.ok);
        assert!(report.text.contains("Home: 1x1 grid"));
        assert!(report.text.contains("Work: error: Invalid `size`"));
        assert!(report.text.contains("1 entries without a string `name`"));
    }

    #[test]
    fn shadowed_names_are_noted() {
        let report = check(
            r#"[{"name":"Home","size":"1x1","buttons":[{"macro":"x"}]},{"name":"Home","size":"1x2","buttons":[{"macro":"y"}]}]"#,
        );
        assert!(report.ok);
        assert_eq!(report.text.matches("note: selecting `Home` by name").count(), 1);
        assert!(report.text.contains("Home: 1x2 grid"));
    }

    #[test]
    fn empty_list_fails() {
        let report = check("[]");
        assert!(!report.ok);
        assert_eq!(report.text, "error: config list is empty\n");
    }

    #[test]
    fn malformed_json_fails() {
        let report = check("{");
        assert!(!report.ok);
        assert!(report.text.starts_with("error: config is not valid JSON"));
    }
}
