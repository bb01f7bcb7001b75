//! Dashboard file → live dispatcher: the builder must survive bad
//! entries and come up with the configured default page active.

use crate::mock_gpio::{MockGpio, last_level};

use hadash::app::layout::ComponentKind;
use hadash::app::page::ButtonAction;
use hadash::config::{DashboardFile, build_dashboard};

const DASHBOARD: &[u8] = br#"{
    "physical_layout": {
        "leds": [
            {"id": "led_kitchen", "name": "Kitchen", "pin": 5},
            {"id": "led_porch", "pin": 6},
            {"id": "led_clash", "pin": 5}
        ],
        "buttons": [
            {"id": "btn_kitchen", "pin": 12},
            {"id": "btn_next", "pin": 13}
        ]
    },
    "pages": [
        {
            "name": "main",
            "description": "Main page",
            "mappings": [
                {"component_id": "led_kitchen", "entity_id": "light.kitchen"},
                {"component_id": "btn_kitchen", "action": "toggle", "entity_id": "light.kitchen"},
                {"component_id": "btn_next", "action": "next_dashboard"},
                {"component_id": "led_ghost", "entity_id": "light.ghost"},
                {"component_id": "led_porch"}
            ]
        },
        {
            "name": "porch",
            "mappings": [
                {"component_id": "led_porch", "entity_id": "light.porch"}
            ]
        }
    ],
    "default_page": "porch"
}"#;

#[test]
fn builds_registry_and_skips_bad_components() {
    let file = DashboardFile::parse(DASHBOARD).unwrap();
    let (gpio, _log) = MockGpio::new();
    let handler = build_dashboard(&file, gpio);

    let layout = handler.layout();
    assert_eq!(layout.len(), 4, "the pin-5 duplicate must be dropped");
    assert!(layout.component("led_clash").is_none());
    assert_eq!(layout.component("led_kitchen").unwrap().kind, ComponentKind::Led);
    assert_eq!(layout.component("btn_next").unwrap().kind, ComponentKind::Button);
}

#[test]
fn default_page_becomes_current() {
    let file = DashboardFile::parse(DASHBOARD).unwrap();
    let (gpio, _log) = MockGpio::new();
    let handler = build_dashboard(&file, gpio);

    assert_eq!(handler.current_page().unwrap().name(), "porch");
}

#[test]
fn first_page_is_fallback_without_default() {
    let mut file = DashboardFile::parse(DASHBOARD).unwrap();
    file.default_page = None;
    let (gpio, _log) = MockGpio::new();
    let handler = build_dashboard(&file, gpio);

    assert_eq!(handler.current_page().unwrap().name(), "main");
}

#[test]
fn mappings_survive_bad_entries() {
    let mut file = DashboardFile::parse(DASHBOARD).unwrap();
    file.default_page = Some("main".into());
    let (gpio, _log) = MockGpio::new();
    let handler = build_dashboard(&file, gpio);

    let page = handler.current_page().unwrap();
    // The two valid button mappings parsed; the ghost component and the
    // action-less LED-without-entity mapping were skipped.
    assert_eq!(
        page.action_for_button("btn_kitchen"),
        Some(&ButtonAction::ToggleEntity("light.kitchen".into()))
    );
    assert_eq!(page.action_for_button("btn_next"), Some(&ButtonAction::NextDashboard));
    assert_eq!(page.virtual_value("light.kitchen"), Some(false));
    assert_eq!(page.virtual_value("light.porch"), None);
}

#[test]
fn built_dispatcher_routes_events() {
    let mut file = DashboardFile::parse(DASHBOARD).unwrap();
    file.default_page = Some("main".into());
    let (gpio, log) = MockGpio::new();
    let mut handler = build_dashboard(&file, gpio);

    handler.apply_state("light.kitchen", "on");
    assert_eq!(last_level(&log, 5), Some(true));
}

#[test]
fn duplicate_page_names_keep_first() {
    let doc = br#"{
        "physical_layout": {"leds": [{"id": "led_a", "pin": 5}]},
        "pages": [
            {"name": "main", "mappings": [{"component_id": "led_a", "entity_id": "light.a"}]},
            {"name": "main", "mappings": []}
        ]
    }"#;
    let file = DashboardFile::parse(doc).unwrap();
    let (gpio, _log) = MockGpio::new();
    let mut handler = build_dashboard(&file, gpio);

    assert_eq!(handler.current_page().unwrap().name(), "main");
    assert_eq!(
        handler.next_page().unwrap(),
        "main",
        "only one page survives, cycling wraps onto it"
    );
}
