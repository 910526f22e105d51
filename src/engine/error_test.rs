//! Error handling and edge-case tests for the workflow engine.

use super::*;
use crate::model::Step;
use serde_json::json;

fn echo_step(id: &str, text: &str) -> Step {
    let mut with = Map::new();
    with.insert("text".to_string(), Value::String(text.to_string()));
    Step {
        id: id.to_string(),
        use_: Some("core.echo".to_string()),
        with: Some(with),
        ..Default::default()
    }
}

#[tokio::test]
async fn missing_adapter_reports_the_tool_name() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "step1".to_string(),
            use_: Some("nonexistent.adapter".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let err = engine.execute(&flow, Map::new()).await.unwrap_err();
    assert!(err.to_string().contains("nonexistent.adapter"));
}

#[tokio::test]
async fn unused_with_fields_are_tolerated() {
    let engine = Engine::for_testing();
    let mut with = Map::new();
    with.insert("wrong_field".to_string(), json!("value"));

    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "step1".to_string(),
            use_: Some("core.echo".to_string()),
            with: Some(with),
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    assert!(result.outputs.contains_key("step1"));
}

#[tokio::test]
async fn undefined_template_variables_render_as_empty_string() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![echo_step("step1", "{{ undefined_variable }}")],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    let text = result.outputs.get("step1").unwrap().get("text").unwrap();
    assert_eq!(text.as_str(), Some(""));
}

#[tokio::test]
async fn forward_reference_to_a_not_yet_run_step_renders_as_empty_string() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![
            echo_step("step1", "{{ steps.step2.text }}"),
            echo_step("step2", "real value"),
        ],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    let text = result.outputs.get("step1").unwrap().get("text").unwrap();
    assert_eq!(text.as_str(), Some(""));
}

#[tokio::test]
async fn catch_steps_that_also_fail_still_surface_the_original_error() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "step1".to_string(),
            use_: Some("nonexistent.tool".to_string()),
            ..Default::default()
        }],
        catch: Some(vec![Step {
            id: "catch1".to_string(),
            use_: Some("also.nonexistent".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let err = engine.execute(&flow, Map::new()).await.unwrap_err();
    match err {
        BeemFlowError::FlowFailed { outputs, source } => {
            assert!(outputs.is_empty());
            assert!(source.to_string().contains("step1"));
        }
        other => panic!("expected FlowFailed, got {other}"),
    }
}

#[tokio::test]
async fn foreach_over_a_non_array_expression_fails_with_the_step_id() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "step1".to_string(),
            foreach: Some("{{ event.not_an_array }}".to_string()),
            as_: Some("item".to_string()),
            do_: Some(vec![echo_step("loop_step", "{{ item }}")]),
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut event = Map::new();
    event.insert("not_an_array".to_string(), json!("a plain string"));

    let err = engine.execute(&flow, event).await.unwrap_err();
    assert!(err.to_string().contains("step1"));
}

#[tokio::test]
async fn parallel_block_partial_failure_still_fails_the_run() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "parallel1".to_string(),
            parallel: Some(true),
            steps: Some(vec![
                echo_step("p1", "success"),
                Step {
                    id: "p2".to_string(),
                    use_: Some("nonexistent.tool".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }],
        ..Default::default()
    };

    let err = engine.execute(&flow, Map::new()).await.unwrap_err();
    assert!(err.to_string().contains("p2"));
}

#[tokio::test]
async fn empty_step_id_is_tolerated_as_an_output_key() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![echo_step("", "test")],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    assert!(result.outputs.contains_key(""));
}

#[tokio::test]
async fn duplicate_step_ids_overwrite_the_shared_output_key() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![echo_step("duplicate", "first"), echo_step("duplicate", "second")],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    let text = result.outputs.get("duplicate").unwrap().get("text").unwrap();
    assert_eq!(text.as_str(), Some("second"));
}

#[tokio::test]
async fn step_with_no_use_field_produces_an_empty_output() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "step1".to_string(),
            use_: None,
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    assert_eq!(result.outputs.get("step1"), Some(&Value::Object(Default::default())));
}

#[tokio::test]
async fn deeply_nested_parallel_blocks_execute_successfully() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![Step {
            id: "outer".to_string(),
            parallel: Some(true),
            steps: Some(vec![Step {
                id: "nested1".to_string(),
                parallel: Some(true),
                steps: Some(vec![echo_step("deep1", "deep")]),
                ..Default::default()
            }]),
            ..Default::default()
        }],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn large_outputs_are_handled() {
    let engine = Engine::for_testing();
    let large_text = "A".repeat(100 * 1024);

    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![echo_step("step1", &large_text)],
        ..Default::default()
    };

    let result = engine.execute(&flow, Map::new()).await.unwrap();
    let text = result.outputs.get("step1").unwrap().get("text").unwrap();
    assert_eq!(text.as_str().unwrap().len(), 100 * 1024);
}

#[tokio::test]
async fn null_event_values_render_as_empty_in_templates() {
    let engine = Engine::for_testing();
    let mut event = Map::new();
    event.insert("null_value".to_string(), json!(null));

    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![echo_step("step1", "{{ event.null_value }}")],
        ..Default::default()
    };

    let result = engine.execute(&flow, event).await.unwrap();
    let text = result.outputs.get("step1").unwrap().get("text").unwrap();
    assert_eq!(text.as_str(), Some(""));
}

#[tokio::test]
async fn first_failure_stops_later_sequential_steps() {
    let engine = Engine::for_testing();
    let flow = Flow {
        name: "test-flow".to_string(),
        steps: vec![
            Step {
                id: "fail1".to_string(),
                use_: Some("nonexistent1".to_string()),
                ..Default::default()
            },
            Step {
                id: "fail2".to_string(),
                use_: Some("nonexistent2".to_string()),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    let err = engine.execute(&flow, Map::new()).await.unwrap_err();
    assert!(err.to_string().contains("fail1"));

    let runs = engine.list_runs().await.unwrap();
    let steps = runs[0].steps.as_ref().unwrap();
    assert_eq!(steps.len(), 1, "only the first, failing step should have run");
}
