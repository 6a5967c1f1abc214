//! Output formatting for CLI display.

use jiff::{Timestamp, tz::TimeZone};

use crate::model::{MiningSession, ScannedBody, SystemExplorationData};

/// One-line summary of a system's exploration progress.
pub(super) fn format_system(system: &SystemExplorationData) -> String {
    let bodies = if system.total_bodies > 0 {
        format!("{}/{}", system.scanned_bodies, system.total_bodies)
    } else {
        system.scanned_bodies.to_string()
    };
    let complete = if system.all_bodies_found { " [complete]" } else { "" };
    format!(
        "{:>16}  {}  {}  scanned {bodies}, mapped {}{complete}",
        system.system_address,
        format_time(system.last_visited),
        system.system_name,
        system.mapped_bodies,
    )
}

pub(super) fn format_body(body: &ScannedBody) -> String {
    let mut line = format!("{:>3}  {}", body.body_id, body.body_name);
    if let Some(kind) = &body.body_type {
        line.push_str(&format!(" ({kind})"));
    }
    if body.distance_ls > 0.0 {
        line.push_str(&format!(", {:.0} ls", body.distance_ls));
    }

    let mut flags = Vec::new();
    if body.landable {
        flags.push("landable");
    }
    if body.mapped {
        flags.push("mapped");
    }
    if !body.was_discovered && body.scanned {
        flags.push("first discovery");
    }
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }

    if !body.signals.is_empty() {
        let signals: Vec<String> = body
            .signals
            .iter()
            .map(|s| format!("{} {}", s.count, s.kind))
            .collect();
        line.push_str(&format!(" signals: {}", signals.join(", ")));
    }
    line
}

pub(super) fn format_mining_session(session: &MiningSession) -> String {
    let place = match (&session.body, &session.star_system) {
        (Some(body), _) => body.clone(),
        (None, Some(system)) => system.clone(),
        (None, None) => "unknown location".to_string(),
    };
    let refined = if session.refined.is_empty() {
        "nothing refined".to_string()
    } else {
        session
            .refined
            .iter()
            .map(|(commodity, tons)| format!("{tons}t {commodity}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let motherlodes: u32 = session.motherlodes.values().sum();
    format!(
        "{}  {place}  {refined}  (prospected {}, motherlodes {motherlodes}, cracked {})",
        format_time(session.started_at),
        session.prospected,
        session.cracked,
    )
}

/// Timestamps print in UTC, like the journal writes them.
fn format_time(ts: Timestamp) -> String {
    ts.to_zoned(TimeZone::UTC).strftime("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::BodySignal;

    fn at(secs: i64) -> Timestamp {
        Timestamp::new(secs, 0).unwrap()
    }

    #[test]
    fn system_line_shows_progress() {
        let mut system = SystemExplorationData::new(42, "Deciat", at(1_704_067_200));
        system.total_bodies = 12;
        system.scanned_bodies = 3;
        system.mapped_bodies = 1;

        assert_eq!(
            format_system(&system),
            "              42  2024-01-01 00:00  Deciat  scanned 3/12, mapped 1"
        );
    }

    #[test]
    fn body_line_lists_flags_and_signals() {
        let mut body = ScannedBody::new(6, "Deciat 6 a");
        body.body_type = Some("Icy body".to_string());
        body.distance_ls = 1520.4;
        body.landable = true;
        body.scanned = true;
        body.was_discovered = true;
        body.signals = vec![BodySignal {
            kind: "Biological".to_string(),
            count: 2,
        }];

        assert_eq!(
            format_body(&body),
            "  6  Deciat 6 a (Icy body), 1520 ls [landable] signals: 2 Biological"
        );
    }

    #[test]
    fn mining_line_lists_refined_commodities() {
        let mut session = MiningSession::start(
            at(1_704_067_200),
            Some("Hyades Sector".to_string()),
            None,
            Some("Hyades Sector 2 A Ring".to_string()),
        );
        session.refined.insert("painite".to_string(), 4);
        session.prospected = 7;

        assert_eq!(
            format_mining_session(&session),
            "2024-01-01 00:00  Hyades Sector 2 A Ring  4t painite  (prospected 7, motherlodes 0, cracked 0)"
        );
    }
}
