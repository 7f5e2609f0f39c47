// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn reasons_serialize_snake_case() {
    let marker = EndedMarker {
        reason: EndedReason::WindowExpired,
        at: 1_722_500_000,
        run_mode: RunMode::Indefinite,
    };
    let json = serde_json::to_string(&marker).unwrap();
    assert!(json.contains("\"reason\":\"window_expired\""));
    assert!(json.contains("\"run_mode\":\"indefinite\""));
}

#[test]
fn marker_round_trips() {
    let marker = EndedMarker {
        reason: EndedReason::Success,
        at: 99,
        run_mode: RunMode::RunOnce,
    };
    let back: EndedMarker =
        serde_json::from_str(&serde_json::to_string(&marker).unwrap()).unwrap();
    assert_eq!(back, marker);
}
