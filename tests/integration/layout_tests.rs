//! Hardware registry invariants: id/pin uniqueness, deassert on
//! deregister, lookup misses.

use crate::mock_gpio::{GpioCall, MockGpio, last_level};

use hadash::app::layout::{ComponentKind, HardwareComponent, LayoutError, PhysicalLayout};

fn led(id: &str, pin: u8) -> HardwareComponent {
    HardwareComponent {
        id: id.into(),
        name: id.into(),
        kind: ComponentKind::Led,
        pin,
    }
}

fn button(id: &str, pin: u8) -> HardwareComponent {
    HardwareComponent {
        id: id.into(),
        name: id.into(),
        kind: ComponentKind::Button,
        pin,
    }
}

#[test]
fn register_configures_pin() {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout.register(led("led_a", 5)).unwrap();
    assert!(log.borrow().contains(&GpioCall::Configure(5)));
    assert_eq!(layout.len(), 1);
}

#[test]
fn duplicate_id_rejected_registry_unchanged() {
    let (gpio, _log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout.register(led("led_a", 5)).unwrap();

    let err = layout.register(led("led_a", 6)).unwrap_err();
    assert_eq!(err, LayoutError::DuplicateId("led_a".into()));
    assert_eq!(layout.len(), 1, "failed registration must not grow the registry");
    assert_eq!(layout.component("led_a").unwrap().pin, 5);
}

#[test]
fn duplicate_pin_rejected_registry_unchanged() {
    let (gpio, _log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout.register(led("led_a", 5)).unwrap();

    let err = layout.register(button("btn_b", 5)).unwrap_err();
    assert_eq!(err, LayoutError::DuplicatePin(5));
    assert_eq!(layout.len(), 1);
    assert!(layout.component("btn_b").is_none());
}

#[test]
fn deregister_deasserts_led() {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout.register(led("led_a", 5)).unwrap();
    layout.set_led("led_a", true).unwrap();
    assert_eq!(last_level(&log, 5), Some(true));

    layout.deregister("led_a").unwrap();
    assert_eq!(last_level(&log, 5), Some(false), "LED must go dark on deregister");
    assert!(layout.is_empty());
}

#[test]
fn set_led_unknown_component_is_lookup_miss() {
    let (gpio, _log) = MockGpio::new();
    let mut layout: PhysicalLayout<MockGpio> = PhysicalLayout::new(gpio);
    assert_eq!(
        layout.set_led("ghost", true).unwrap_err(),
        LayoutError::UnknownComponent("ghost".into())
    );
}

#[test]
fn set_led_on_button_rejected() {
    let (gpio, log) = MockGpio::new();
    let mut layout = PhysicalLayout::new(gpio);
    layout.register(button("btn_a", 12)).unwrap();

    assert_eq!(
        layout.set_led("btn_a", true).unwrap_err(),
        LayoutError::NotAnLed("btn_a".into())
    );
    assert_eq!(last_level(&log, 12), None, "button pin must not be driven");
}

#[test]
fn deregister_unknown_is_lookup_miss() {
    let (gpio, _log) = MockGpio::new();
    let mut layout: PhysicalLayout<MockGpio> = PhysicalLayout::new(gpio);
    assert!(matches!(layout.deregister("ghost"), Err(LayoutError::UnknownComponent(_))));
}
