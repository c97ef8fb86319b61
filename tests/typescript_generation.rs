//! TypeScript Generation Tests
//!
//! Validates that the snapshot types handed to UI layers can be exported to
//! TypeScript when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<voltwatch::DisplaySnapshot>();
    assert_type::<voltwatch::ChannelState>();
    assert_type::<voltwatch::ChannelId>();
    assert_type::<voltwatch::StatusColor>();
    assert_type::<voltwatch::StatusFlags>();
    assert_type::<voltwatch::UpdateRate>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = voltwatch::UpdateRate::Native;
    let _ = voltwatch::DisplaySnapshot::default();
}
