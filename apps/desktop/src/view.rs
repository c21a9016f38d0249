use shared::domain::{subtotal, CartItem};

pub fn format_price(value: f64) -> String {
    format!("R$ {:.2}", value).replace('.', ",")
}

pub fn render_cart(items: &[CartItem]) -> String {
    if items.is_empty() {
        return "Carrinho vazio\n".to_string();
    }
    let mut out = String::new();
    for item in items {
        out.push_str(&format!(
            "{}x {}  {}\n",
            item.quantity,
            item.title(),
            format_price(item.line_total())
        ));
    }
    out.push_str(&format!("Subtotal  {}\n", format_price(subtotal(items))));
    out
}

pub fn render_notification(label: &str, item: &CartItem) -> String {
    format!("{label}: {}x {}", item.quantity, item.title())
}
