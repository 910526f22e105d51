use super::*;
use serde_json::json;

#[test]
fn flow_deserializes_from_json() {
    let flow: Flow = serde_json::from_value(json!({
        "name": "hello",
        "steps": [
            {"id": "greet", "use": "core.echo", "with": {"text": "Hello, world!"}}
        ]
    }))
    .unwrap();

    assert_eq!(flow.name, "hello");
    assert_eq!(flow.steps.len(), 1);
    assert_eq!(flow.steps[0].id, "greet");
    assert_eq!(flow.steps[0].use_.as_deref(), Some("core.echo"));
}

#[test]
fn step_kind_fields_round_trip() {
    let step: Step = serde_json::from_value(json!({
        "id": "loop",
        "foreach": "{{ list }}",
        "as": "item",
        "parallel": true,
        "do": [
            {"id": "d_{{item}}", "use": "core.echo", "with": {"text": "{{item}}"}}
        ]
    }))
    .unwrap();

    assert_eq!(step.foreach.as_deref(), Some("{{ list }}"));
    assert_eq!(step.as_.as_deref(), Some("item"));
    assert_eq!(step.parallel, Some(true));
    assert_eq!(step.do_.unwrap().len(), 1);
}

#[test]
fn await_event_token_template_reads_match_token() {
    let step: Step = serde_json::from_value(json!({
        "id": "wait",
        "await_event": {
            "match": { "token": "{{ event.token }}" }
        }
    }))
    .unwrap();

    let spec = step.await_event.unwrap();
    assert_eq!(spec.token_template(), Some("{{ event.token }}"));
}

#[test]
fn run_status_serializes_screaming_snake_case() {
    let s = serde_json::to_string(&RunStatus::Waiting).unwrap();
    assert_eq!(s, "\"WAITING\"");
}
