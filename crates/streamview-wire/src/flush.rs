//! Encoding one flush (signal delta + effect queue) into wire events.

use crate::effect::{script_tag, Effect};
use crate::event::{EventType, WireEvent, SIGNALS_PREFIX};
use crate::Signals;

/// Encode a flush.
///
/// A non-empty `signals` map becomes one `patch-signals` event, emitted
/// first. Every effect then becomes one `patch-elements` event, in queue
/// order. Scripts are appended to `body` as `<script>` elements.
pub fn encode_flush(signals: &Signals, effects: &[Effect]) -> Vec<WireEvent> {
    let mut events = Vec::with_capacity(effects.len().saturating_add(1));

    if !signals.is_empty() {
        let json = serde_json::Value::Object(signals.clone()).to_string();
        events.push(WireEvent::new(
            EventType::PatchSignals,
            vec![format!("{SIGNALS_PREFIX}{json}")],
        ));
    }

    for effect in effects {
        let event = match effect {
            Effect::Patch { selector, markup } => elements_event(selector, "outer", markup),
            Effect::Script { source, options } => {
                elements_event("body", "append", &script_tag(source, options))
            }
        };
        events.push(event);
    }

    events
}

/// Concatenate encoded frames into one body.
pub fn render_events(events: &[WireEvent]) -> String {
    events.iter().map(WireEvent::encode).collect()
}

fn elements_event(selector: &str, mode: &str, markup: &str) -> WireEvent {
    let mut lines = vec![format!("selector {selector}"), format!("mode {mode}")];
    // Markup newlines would end the data line early; one `elements` line each.
    let mut markup_lines = markup.lines().peekable();
    if markup_lines.peek().is_none() {
        lines.push(String::from("elements "));
    }
    lines.extend(markup_lines.map(|line| format!("elements {line}")));
    WireEvent::new(EventType::PatchElements, lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::effect::ScriptOptions;
    use crate::event::{decode_stream, signals_of};

    fn signals(value: serde_json::Value) -> Signals {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Signals::new(),
        }
    }

    #[test]
    fn empty_flush_encodes_nothing() {
        assert!(encode_flush(&Signals::new(), &[]).is_empty());
    }

    #[test]
    fn signals_round_trip_through_frame() {
        let original = signals(json!({
            "count": 6,
            "name": "línea \"dos\"",
            "nested": {"list": [1, 2, null], "flag": true},
        }));
        let body = render_events(&encode_flush(&original, &[]));
        let events = decode_stream(&body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(signals_of(&events[0]).unwrap(), original);
    }

    #[test]
    fn patch_emits_selector_mode_elements() {
        let events = encode_flush(
            &Signals::new(),
            &[Effect::patch("#count", "<span id=\"count\">6</span>")],
        );
        assert_eq!(
            events[0].lines,
            vec![
                "selector #count".to_owned(),
                "mode outer".to_owned(),
                "elements <span id=\"count\">6</span>".to_owned(),
            ]
        );
    }

    #[test]
    fn multi_line_markup_splits_into_elements_lines() {
        let events = encode_flush(&Signals::new(), &[Effect::patch("#list", "<ul>\n<li>a</li>\n</ul>")]);
        assert_eq!(
            &events[0].lines[2..],
            &[
                "elements <ul>".to_owned(),
                "elements <li>a</li>".to_owned(),
                "elements </ul>".to_owned(),
            ]
        );
    }

    #[test]
    fn scripts_append_to_body() {
        let events = encode_flush(
            &Signals::new(),
            &[Effect::Script {
                source: "alert(1)".to_owned(),
                options: ScriptOptions::default(),
            }],
        );
        assert_eq!(events[0].event_type, EventType::PatchElements);
        assert_eq!(events[0].lines[0], "selector body");
        assert_eq!(events[0].lines[1], "mode append");
        assert_eq!(events[0].lines[2], "elements <script>alert(1);");
        assert_eq!(
            events[0].lines[3],
            "elements document.currentScript.remove()</script>"
        );
    }

    #[test]
    fn effect_order_is_preserved_after_signals() {
        let effects: Vec<Effect> = (0..12)
            .map(|i| {
                if i % 3 == 0 {
                    Effect::script(format!("step({i})"))
                } else {
                    Effect::patch(format!("#item-{i}"), format!("<li id=\"item-{i}\">{i}</li>"))
                }
            })
            .collect();
        let body = render_events(&encode_flush(&signals(json!({"n": 1})), &effects));
        let events = decode_stream(&body).unwrap();

        assert_eq!(events.len(), 13);
        assert_eq!(events[0].event_type, EventType::PatchSignals);
        for (i, event) in events[1..].iter().enumerate() {
            let markup = &event.lines[2];
            if i % 3 == 0 {
                assert!(markup.contains(&format!("step({i})")), "{markup}");
            } else {
                assert!(markup.contains(&format!("id=\"item-{i}\"")), "{markup}");
            }
        }
    }
}
