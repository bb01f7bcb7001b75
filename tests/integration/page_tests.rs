//! Page semantics: binding validation, the virtual/physical dual-write
//! discipline, and the case-insensitive "on" comparison.

use crate::mock_gpio::{MockGpio, clear, last_level, writes};

use hadash::app::layout::{ComponentKind, HardwareComponent, LayoutError, PhysicalLayout};
use hadash::app::page::{ButtonAction, DashPage};

fn layout_with_led(pin: u8) -> (PhysicalLayout<MockGpio>, crate::mock_gpio::CallLog) {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout
        .register(HardwareComponent {
            id: "led_a".into(),
            name: "LED A".into(),
            kind: ComponentKind::Led,
            pin,
        })
        .unwrap();
    clear(&log);
    (layout, log)
}

#[test]
fn on_comparison_is_case_insensitive() {
    let (mut layout, log) = layout_with_led(5);
    let mut page = DashPage::new("main", "");
    page.map_led("light.kitchen", "led_a", &layout).unwrap();

    for state in ["on", "On", "ON"] {
        page.update_led_state("light.kitchen", state, &mut layout, true);
        assert_eq!(last_level(&log, 5), Some(true), "state {state:?} must assert");
    }

    for state in ["off", "Off", "unavailable", "ON ", ""] {
        page.update_led_state("light.kitchen", state, &mut layout, true);
        assert_eq!(last_level(&log, 5), Some(false), "state {state:?} must deassert");
    }
}

#[test]
fn repeated_events_are_idempotent() {
    let (mut layout, log) = layout_with_led(5);
    let mut page = DashPage::new("main", "");
    page.map_led("light.kitchen", "led_a", &layout).unwrap();

    assert!(page.update_led_state("light.kitchen", "on", &mut layout, true));
    assert!(
        !page.update_led_state("light.kitchen", "on", &mut layout, true),
        "second identical event must report no change"
    );
    assert!(!page.update_led_state("light.kitchen", "ON", &mut layout, true));

    assert_eq!(page.virtual_value("light.kitchen"), Some(true));
    assert_eq!(writes(&log), vec![(5, true)], "exactly one hardware write");
}

#[test]
fn inactive_page_updates_virtual_only() {
    let (mut layout, log) = layout_with_led(5);
    let mut page = DashPage::new("other", "");
    page.map_led("light.kitchen", "led_a", &layout).unwrap();

    page.update_led_state("light.kitchen", "on", &mut layout, false);

    assert_eq!(page.virtual_value("light.kitchen"), Some(true), "virtual state must track");
    assert!(writes(&log).is_empty(), "inactive page must not touch hardware");
}

#[test]
fn unknown_entity_is_a_noop() {
    let (mut layout, log) = layout_with_led(5);
    let mut page = DashPage::new("main", "");
    page.map_led("light.kitchen", "led_a", &layout).unwrap();

    assert!(!page.update_led_state("sensor.unrelated", "on", &mut layout, true));

    assert!(writes(&log).is_empty());
    assert_eq!(page.virtual_value("light.kitchen"), Some(false), "seeded state untouched");
}

#[test]
fn led_binding_must_resolve_to_an_led() {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout
        .register(HardwareComponent {
            id: "btn_a".into(),
            name: "btn_a".into(),
            kind: ComponentKind::Button,
            pin: 12,
        })
        .unwrap();
    clear(&log);
    let mut page = DashPage::new("main", "");

    assert_eq!(
        page.map_led("light.a", "btn_a", &layout).unwrap_err(),
        LayoutError::NotAnLed("btn_a".into())
    );
    assert_eq!(
        page.map_led("light.b", "ghost_component", &layout).unwrap_err(),
        LayoutError::UnknownComponent("ghost_component".into())
    );

    // Rejected bindings leave the page untouched: no virtual state is
    // seeded and events for those entities stay no-ops.
    assert_eq!(page.virtual_value("light.a"), None);
    assert_eq!(page.virtual_value("light.b"), None);
    assert!(!page.update_led_state("light.a", "on", &mut layout, true));
    assert!(writes(&log).is_empty());
}

#[test]
fn button_binding_must_resolve_to_a_button() {
    let (layout, _log) = layout_with_led(5);
    let mut page = DashPage::new("main", "");

    assert_eq!(
        page.map_button("led_a", ButtonAction::NextDashboard, &layout).unwrap_err(),
        LayoutError::NotAButton("led_a".into())
    );
    assert!(matches!(
        page.map_button("ghost", ButtonAction::NextDashboard, &layout),
        Err(LayoutError::UnknownComponent(_))
    ));
    assert_eq!(page.action_for_button("led_a"), None);
}

#[test]
fn sync_drives_all_mapped_leds() {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    for (id, pin) in [("led_a", 5), ("led_b", 6)] {
        layout
            .register(HardwareComponent {
                id: id.into(),
                name: id.into(),
                kind: ComponentKind::Led,
                pin,
            })
            .unwrap();
    }

    let mut page = DashPage::new("main", "");
    page.map_led("light.a", "led_a", &layout).unwrap();
    page.map_led("light.b", "led_b", &layout).unwrap();
    page.update_led_state("light.a", "on", &mut layout, false);
    page.update_led_state("light.b", "off", &mut layout, false);

    clear(&log);
    page.sync_physical_to_virtual(&mut layout);

    assert_eq!(last_level(&log, 5), Some(true));
    assert_eq!(last_level(&log, 6), Some(false));
    assert_eq!(writes(&log).len(), 2, "exactly one write per mapped LED");
}

#[test]
fn button_actions_resolve_and_miss() {
    let (gpio, _log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    for (id, pin) in [("btn_a", 12), ("btn_b", 13)] {
        layout
            .register(HardwareComponent {
                id: id.into(),
                name: id.into(),
                kind: ComponentKind::Button,
                pin,
            })
            .unwrap();
    }

    let mut page = DashPage::new("main", "");
    page.map_button("btn_a", ButtonAction::ToggleEntity("light.kitchen".into()), &layout)
        .unwrap();
    page.map_button("btn_b", ButtonAction::NextDashboard, &layout).unwrap();

    assert_eq!(
        page.action_for_button("btn_a"),
        Some(&ButtonAction::ToggleEntity("light.kitchen".into()))
    );
    assert_eq!(page.action_for_button("btn_b"), Some(&ButtonAction::NextDashboard));
    assert_eq!(page.action_for_button("btn_zzz"), None);
}
