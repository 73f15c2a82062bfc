use crate::model::{AppView, Scope};
use crate::sync::{ConnectionState, Snapshot};

use super::frame::{Line, Span, Tone};
use super::shared::truncate_str;

const CRUMB_SEP: &str = " › ";

/// Breadcrumb label for `view`: the value chosen at that level when the user
/// has drilled past it, the view title otherwise.
fn crumb(view: &AppView, scope: &Scope, current: &AppView) -> String {
    let chosen = |set: &std::collections::BTreeSet<String>| -> Option<String> {
        if view == current { None } else { set.iter().next().cloned() }
    };
    match view {
        AppView::Clusters => chosen(&scope.clusters),
        AppView::Namespaces => chosen(&scope.namespaces),
        AppView::Projects => chosen(&scope.projects),
        AppView::ApplicationSets => chosen(&scope.application_sets),
        AppView::Apps | AppView::Tree(_) => None,
    }
    .unwrap_or_else(|| view.title().to_string())
}

fn connection_tone(state: &ConnectionState) -> Tone {
    match state {
        ConnectionState::Live => Tone::Good,
        ConnectionState::Connecting => Tone::Accent,
        ConnectionState::Reconnecting { .. } => Tone::Warn,
        ConnectionState::Stopped => Tone::Bad,
    }
}

/// Title bar plus separator.
pub fn header_lines(view: &AppView, scope: &Scope, snapshot: &Snapshot, cols: usize) -> Vec<Line> {
    let mut line = Line::new(vec![Span::plain("  ")]);
    let trail = view.breadcrumb(scope);
    for (i, step) in trail.iter().enumerate() {
        if i > 0 {
            line.push(Span::new(CRUMB_SEP, Tone::Muted));
        }
        let tone = if step == view { Tone::Title } else { Tone::Muted };
        line.push(Span::new(truncate_str(&crumb(step, scope, view), 40), tone));
    }

    let status = format!(
        "● {}  {} apps  {} ",
        snapshot.connection.label(),
        snapshot.apps.len(),
        snapshot.updated_at.format("%H:%M:%S")
    );
    let used = line.width();
    let status_width = status.chars().count();
    if used + status_width + 1 <= cols {
        line.push(Span::plain(" ".repeat(cols - used - status_width)));
        line.push(Span::new(status, connection_tone(&snapshot.connection)));
    }

    vec![line, Line::new(vec![Span::new("─".repeat(cols), Tone::Muted)])]
}
