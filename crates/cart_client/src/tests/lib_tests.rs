use super::*;
use std::sync::Mutex;

use shared::domain::Product;

fn notification(kind: CartEventKind, title: &str) -> CartNotification {
    CartNotification {
        kind,
        item: CartItem::new(Product::new(title, 1.0).expect("product"), 1).expect("item"),
    }
}

fn recording_handler(label: &'static str, seen: &Arc<Mutex<Vec<(String, String)>>>) -> ItemHandler {
    let seen = Arc::clone(seen);
    item_handler(move |item| {
        seen.lock()
            .expect("seen")
            .push((label.to_string(), item.product.title));
    })
}

#[test]
fn dispatch_without_handler_drops_notification() {
    let slots = HandlerSlots::default();
    assert!(!slots.dispatch(notification(CartEventKind::Added, "Tang")));
}

#[test]
fn last_registration_wins() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let slots = HandlerSlots::default();
    slots.set(CartEventKind::Added, recording_handler("first", &seen));
    slots.set(CartEventKind::Added, recording_handler("second", &seen));

    assert!(slots.dispatch(notification(CartEventKind::Added, "Tang")));
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![("second".to_string(), "Tang".to_string())]
    );
}

#[test]
fn add_and_remove_slots_are_independent() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let slots = HandlerSlots::default();
    slots.set(CartEventKind::Removed, recording_handler("removed", &seen));

    assert!(!slots.dispatch(notification(CartEventKind::Added, "Tang")));
    assert!(slots.dispatch(notification(CartEventKind::Removed, "Bombril")));
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![("removed".to_string(), "Bombril".to_string())]
    );
}

#[test]
fn handler_may_reregister_while_running() {
    let slots = Arc::new(HandlerSlots::default());
    let calls = Arc::new(Mutex::new(0u32));
    let inner_calls = Arc::clone(&calls);
    let inner_slots = Arc::clone(&slots);
    slots.set(
        CartEventKind::Added,
        item_handler(move |_| {
            *inner_calls.lock().expect("calls") += 1;
            inner_slots.set(CartEventKind::Added, item_handler(|_| {}));
        }),
    );

    assert!(slots.dispatch(notification(CartEventKind::Added, "Tang")));
    assert!(slots.dispatch(notification(CartEventKind::Added, "Tang")));
    assert_eq!(*calls.lock().expect("calls"), 1);
}
