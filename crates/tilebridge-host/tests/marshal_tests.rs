//! Text marshalling through a live guest's linear memory.
//!
//! Tests validate:
//! - Placed text decodes back to the same text, including the empty string
//! - Placement survives a guest that grows memory on every allocation
//! - Text pushed on the value stack reaches the guest intact
//! - Invalid UTF-8 and out-of-range reads are reported, not recovered
//! - Guest-supplied lengths are range-checked before any copy

use proptest::prelude::*;
use tilebridge_guestgen::{assemble, GuestSpec};
use tilebridge_host::{
    BridgeSession, ElementRegistry, HostServices, RecordingCanvas, RenderSurface, SeededRandom,
};
use tilebridge_types::{BoardGeometry, BridgeError, ErrorCode, GridStyle};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

type Services = HostServices<RecordingCanvas, ElementRegistry>;

fn services() -> Services {
    HostServices::new(
        RenderSurface::new(
            RecordingCanvas::new(),
            BoardGeometry::default(),
            GridStyle::default(),
        ),
        ElementRegistry::new(),
        Box::new(SeededRandom::new(1)),
    )
}

fn session_for(spec: &GuestSpec) -> BridgeSession<Services> {
    let wasm = assemble(spec).expect("assemble guest");
    let mut session = BridgeSession::new(spec.abi.clone()).expect("link capabilities");
    session.load(&wasm, services()).expect("load guest");
    session
}

fn echo_guest() -> GuestSpec {
    GuestSpec {
        echo_export: Some("echo".into()),
        ..GuestSpec::default()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Properties
// ══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any printable text, placing it and decoding the placed range
    /// yields the same text.
    #[test]
    fn placed_text_round_trips(text in "\\PC{0,64}") {
        let mut session = session_for(&GuestSpec::default());
        let placed = session.place_text(&text).unwrap();
        prop_assert_eq!(placed.length as usize, text.len());
        prop_assert_eq!(session.read_text(placed.address, placed.length).unwrap(), text);
    }

    /// The same holds when every allocation grows (and may move) memory.
    #[test]
    fn placed_text_round_trips_across_growth(
        texts in proptest::collection::vec("\\PC{1,32}", 1..6)
    ) {
        let mut session = session_for(&GuestSpec {
            grow_on_alloc: true,
            ..GuestSpec::default()
        });
        let placed: Vec<_> = texts
            .iter()
            .map(|t| session.place_text(t).unwrap())
            .collect();
        for (text, p) in texts.iter().zip(&placed) {
            prop_assert_eq!(&session.read_text(p.address, p.length).unwrap(), text);
        }
    }

    /// Text handed to the guest on the value stack comes back through `log`.
    #[test]
    fn pushed_text_reaches_guest(text in "\\PC{0,48}") {
        let mut session = session_for(&echo_guest());
        session.call_with_text("echo", &text).unwrap();
        let console = &session.services().unwrap().console;
        prop_assert_eq!(console.last(), Some(text.as_str()));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Edge cases
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn empty_text_is_not_allocated() {
    let mut session = session_for(&GuestSpec::default());
    let placed = session.place_text("").unwrap();
    assert_eq!((placed.address, placed.length), (0, 0));
    assert_eq!(session.read_text(0, 0).unwrap(), "");
    assert_eq!(session.guest_global_i32("alloc_count").unwrap(), 0);
}

#[test]
fn empty_text_echoes_as_empty_line() {
    let mut session = session_for(&echo_guest());
    session.call_with_text("echo", "").unwrap();
    assert_eq!(session.services().unwrap().console.last(), Some(""));
    assert_eq!(session.guest_global_i32("stack_depth").unwrap(), 0);
}

#[test]
fn multibyte_text_round_trips() {
    let mut session = session_for(&echo_guest());
    session.call_with_text("echo", "héllo, 世界 🧱").unwrap();
    assert_eq!(
        session.services().unwrap().console.last(),
        Some("héllo, 世界 🧱")
    );
}

#[test]
fn invalid_utf8_from_guest_is_decode_error() {
    let mut session = session_for(&GuestSpec {
        construct_log: Some(vec![b'o', b'k', 0xff, 0xfe]),
        ..GuestSpec::default()
    });
    let err = session.construct(10, 20).unwrap_err();
    assert!(matches!(err, BridgeError::Decode { length: 4, .. }), "{err:?}");
    assert_eq!(err.code(), ErrorCode::INVALID_UTF8);
    assert_eq!(session.last_fault(), Some(ErrorCode::INVALID_UTF8));
    assert!(session.services().unwrap().console.is_empty());
}

#[test]
fn read_past_memory_end_is_out_of_bounds() {
    let session = session_for(&GuestSpec::default());
    let err = session.read_text(65_530, 16).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::OutOfBounds {
            address: 65_530,
            length: 16
        }
    ));
}

#[test]
fn full_range_length_is_out_of_bounds() {
    let session = session_for(&GuestSpec::default());
    let err = session.read_text(0, u32::MAX).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::OutOfBounds {
            address: 0,
            length: u32::MAX
        }
    ));
    let err = session.read_text(u32::MAX, 2).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OUT_OF_BOUNDS);
}

#[test]
fn negative_log_length_fails_only_the_call() {
    let mut session = session_for(&GuestSpec {
        construct_log: Some(b"hello".to_vec()),
        construct_log_length: Some(-1),
        ..GuestSpec::default()
    });
    let err = session.construct(10, 20).unwrap_err();
    assert!(
        matches!(
            err,
            BridgeError::OutOfBounds {
                address: 0,
                length: u32::MAX
            }
        ),
        "{err:?}"
    );
    assert_eq!(session.last_fault(), Some(ErrorCode::OUT_OF_BOUNDS));
    assert!(session.services().unwrap().console.is_empty());
    // The session itself is intact.
    assert_eq!(session.read_text(0, 5).unwrap(), "hello");
}

#[test]
fn call_with_text_before_load_is_not_loaded() {
    let mut session = BridgeSession::<Services>::new(Default::default()).unwrap();
    let err = session.call_with_text("echo", "x").unwrap_err();
    assert!(matches!(err, BridgeError::NotLoaded));
}
