use crate::domain::Snapshot;
use crate::drift::DriftReport;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;
use tracing::{debug, instrument};

const CONTEXT_LINES: usize = 3;

/// Compares the archived snapshot with the live one. Only the content is compared, timestamps are carried as metadata.
#[instrument(skip_all, fields(device_id = %current.device()))]
pub fn compare(previous: &Snapshot, current: &Snapshot) -> DriftReport {
    let diff = TextDiff::from_lines(previous.content(), current.content());

    let (mut added, mut removed) = (0, 0);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let (body, html) = if added + removed == 0 {
        (String::new(), String::new())
    } else {
        let body = diff
            .unified_diff()
            .context_radius(CONTEXT_LINES)
            .header(&previous.source().to_string(), &current.source().to_string())
            .to_string();
        (body, render_html(&diff, previous, current))
    };

    debug!("🔍 Compared snapshots, {} line(s) added, {} line(s) removed", added, removed);
    DriftReport::new(
        current.device().clone(),
        previous.retrieved_at(),
        current.retrieved_at(),
        body,
        added,
        removed,
        html,
    )
}

fn render_html(diff: &TextDiff<'_, '_, '_, str>, previous: &Snapshot, current: &Snapshot) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<h2>Configuration drift on {}</h2>\n<p>Archived backup from {}, live backup from {}</p>\n<table style=\"font-family: monospace; border-collapse: collapse\">\n",
        escape(current.device().as_str()),
        previous.retrieved_at().to_rfc3339(),
        current.retrieved_at().to_rfc3339()
    );

    for (index, group) in diff.grouped_ops(CONTEXT_LINES).iter().enumerate() {
        if index > 0 {
            html.push_str("<tr><td colspan=\"3\">&hellip;</td></tr>\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, style) = match change.tag() {
                    ChangeTag::Delete => ("-", " style=\"background: #ffecec\""),
                    ChangeTag::Insert => ("+", " style=\"background: #eaffea\""),
                    ChangeTag::Equal => ("&nbsp;", ""),
                };
                let line = change.old_index().or(change.new_index()).map_or(0, |index| index + 1);
                let _ = writeln!(
                    html,
                    "<tr{}><td>{}</td><td>{}</td><td><pre style=\"margin: 0\">{}</pre></td></tr>",
                    style,
                    line,
                    sign,
                    escape(change.value().trim_end_matches('\n'))
                );
            }
        }
    }

    html.push_str("</table>\n");
    html
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
