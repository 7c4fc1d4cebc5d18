#![cfg(feature = "serde")]

use layer_tree::{DragConfig, DropMode, Layer, LayerId, LayerKind, LayerTreeState};

#[test]
fn layer_json_shape() {
    let page = Layer::bare(0, LayerKind::Container)
        .with_children(vec![Layer::bare(7, LayerKind::Image).locked(true)]);
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["id"], 0);
    assert_eq!(json["kind"], "container");
    assert_eq!(json["children"][0]["kind"], "image");
    assert_eq!(json["children"][0]["locked"], true);
    // Leaves carry no children field at all.
    assert!(json["children"][0].get("children").is_none());

    let back: Layer = serde_json::from_value(json).unwrap();
    assert_eq!(back, page);
}

#[test]
fn view_snapshot_restores_from_json() {
    let mut state = LayerTreeState::new();
    state.set_collapsed(LayerId(4), true);
    state.select(Some(LayerId(9)));
    let json = serde_json::to_string(&state.snapshot()).unwrap();

    let mut restored = LayerTreeState::new();
    restored.restore(serde_json::from_str(&json).unwrap());
    assert!(restored.is_collapsed(LayerId(4)));
    assert_eq!(restored.selected_id(), Some(LayerId(9)));
}

#[test]
fn drag_config_reads_mode() {
    let json = r#"{
        "threshold": 6.0,
        "zones": { "strong_expanded": 0.15, "strong_empty": 0.1, "weak": 0.2 },
        "mode": "projection",
        "indent_width": 24.0
    }"#;
    let config: DragConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.mode, DropMode::Projection);
    assert_eq!(config.indent_width, 24.0);
}
