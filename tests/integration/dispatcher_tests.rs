//! Dispatcher routing: event fan-out, page isolation, page switching,
//! and the resync path.

use crate::mock_gpio::{MockGpio, clear, last_level, writes};

use hadash::app::dispatcher::{DispatchError, EventHandler};
use hadash::app::layout::{ComponentKind, HardwareComponent, PhysicalLayout};
use hadash::app::page::{ButtonAction, DashPage};
use serde_json::json;

/// Two pages over two LEDs: page "lights" maps light.a → led_a (pin 5),
/// page "covers" maps cover.b → led_b (pin 6).
fn make_dispatcher() -> (EventHandler<MockGpio>, crate::mock_gpio::CallLog) {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    for (id, pin, kind) in [
        ("led_a", 5u8, ComponentKind::Led),
        ("led_b", 6, ComponentKind::Led),
        ("btn_a", 12, ComponentKind::Button),
    ] {
        layout
            .register(HardwareComponent { id: id.into(), name: id.into(), kind, pin })
            .unwrap();
    }

    let mut handler = EventHandler::new(layout);

    let mut lights = DashPage::new("lights", "light states");
    lights.map_led("light.a", "led_a", handler.layout()).unwrap();
    lights
        .map_button("btn_a", ButtonAction::ToggleEntity("light.a".into()), handler.layout())
        .unwrap();
    handler.add_page(lights).unwrap();

    let mut covers = DashPage::new("covers", "cover states");
    covers.map_led("cover.b", "led_b", handler.layout()).unwrap();
    covers.map_button("btn_a", ButtonAction::NextDashboard, handler.layout()).unwrap();
    handler.add_page(covers).unwrap();

    handler.set_current_page("lights").unwrap();
    clear(&log);
    (handler, log)
}

fn state_changed(entity_id: &str, state: &str) -> serde_json::Value {
    json!({
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": {
                "entity_id": entity_id,
                "new_state": {"state": state}
            }
        }
    })
}

#[test]
fn event_drives_current_page_led() {
    let (mut handler, log) = make_dispatcher();
    handler.handle_event(&state_changed("light.a", "on"));
    assert_eq!(last_level(&log, 5), Some(true));
}

#[test]
fn event_for_inactive_page_stays_virtual() {
    let (mut handler, log) = make_dispatcher();
    handler.handle_event(&state_changed("cover.b", "on"));

    assert!(writes(&log).is_empty(), "inactive page must not write pins");

    // The state surfaces as soon as the page becomes active.
    handler.set_current_page("covers").unwrap();
    assert_eq!(last_level(&log, 6), Some(true));
}

#[test]
fn page_switch_writes_exactly_new_page_states() {
    let (mut handler, log) = make_dispatcher();
    handler.handle_event(&state_changed("light.a", "on"));
    handler.handle_event(&state_changed("cover.b", "on"));
    clear(&log);

    handler.set_current_page("covers").unwrap();

    let w = writes(&log);
    assert_eq!(w, vec![(6, true)], "only the new page's mapped LEDs get written");
}

#[test]
fn malformed_envelopes_ignored() {
    let (mut handler, log) = make_dispatcher();

    handler.handle_event(&json!({"type": "result", "success": true}));
    handler.handle_event(&json!({"type": "event", "event": {"event_type": "call_service"}}));
    handler.handle_event(&json!({
        "type": "event",
        "event": {"event_type": "state_changed", "data": {"entity_id": "light.a"}}
    }));
    handler.handle_event(&json!({
        "type": "event",
        "event": {"event_type": "state_changed", "data": {"new_state": {"state": "on"}}}
    }));

    assert!(writes(&log).is_empty(), "nothing well-formed arrived");
}

#[test]
fn next_page_cycles_in_insertion_order() {
    let (mut handler, _log) = make_dispatcher();
    assert_eq!(handler.current_page().unwrap().name(), "lights");
    assert_eq!(handler.next_page().unwrap(), "covers");
    assert_eq!(handler.next_page().unwrap(), "lights", "wraps to the first page");
}

#[test]
fn unknown_page_is_an_error() {
    let (mut handler, _log) = make_dispatcher();
    assert_eq!(
        handler.set_current_page("ghost"),
        Err(DispatchError::UnknownPage("ghost".into()))
    );
    assert_eq!(handler.current_page().unwrap().name(), "lights", "current unchanged");
}

#[test]
fn duplicate_page_name_rejected() {
    let (mut handler, _log) = make_dispatcher();
    let err = handler.add_page(DashPage::new("lights", "")).unwrap_err();
    assert_eq!(err, DispatchError::DuplicatePage("lights".into()));
}

#[test]
fn button_action_follows_current_page() {
    let (mut handler, _log) = make_dispatcher();
    assert_eq!(
        handler.action_for_button("btn_a"),
        Some(ButtonAction::ToggleEntity("light.a".into()))
    );

    handler.next_page().unwrap();
    assert_eq!(handler.action_for_button("btn_a"), Some(ButtonAction::NextDashboard));
    assert_eq!(handler.action_for_button("btn_nope"), None);
}

#[test]
fn resync_replays_snapshot_into_all_pages() {
    let (mut handler, log) = make_dispatcher();
    let states = json!([
        {"entity_id": "light.a", "state": "on"},
        {"entity_id": "cover.b", "state": "Open"},
        {"entity_id": "sensor.noise", "state": "42"},
        {"no_entity": true}
    ]);
    handler.resync_from_states(&states);

    assert_eq!(last_level(&log, 5), Some(true), "active page written");
    assert_eq!(last_level(&log, 6), None, "inactive page untouched");

    handler.set_current_page("covers").unwrap();
    assert_eq!(last_level(&log, 6), Some(false), "'Open' is not 'on'");
}
