use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::model::GenericError;
use crate::model::mongo_model::{Book, Order, User};

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 20.0;
const LINE_STEP_MM: f64 = 7.0;

/// Renders the order invoice as a single-page PDF, drawn top to bottom with
/// no layout engine. `books` supplies titles for the item lines; items whose
/// book has since been deleted fall back to the raw id.
pub fn render_invoice(
    order: &Order,
    customer: &User,
    books: &[Book],
) -> Result<Vec<u8>, GenericError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Invoice {}", order._id.to_hex()),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    layer.use_text("Bookstore", 20.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= LINE_STEP_MM * 1.5;
    layer.use_text(
        format!("Invoice {}", order._id.to_hex()),
        11.0,
        Mm(MARGIN_MM),
        Mm(y),
        &regular,
    );
    y -= LINE_STEP_MM;
    let issued = order
        .created_at
        .try_to_rfc3339_string()
        .unwrap_or_default();
    layer.use_text(format!("Date: {}", issued), 11.0, Mm(MARGIN_MM), Mm(y), &regular);

    y -= LINE_STEP_MM * 2.0;
    layer.use_text("Billed to", 12.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= LINE_STEP_MM;
    layer.use_text(&customer.fullname, 11.0, Mm(MARGIN_MM), Mm(y), &regular);
    y -= LINE_STEP_MM;
    layer.use_text(&customer.email, 11.0, Mm(MARGIN_MM), Mm(y), &regular);

    y -= LINE_STEP_MM * 2.0;
    layer.use_text("Items", 12.0, Mm(MARGIN_MM), Mm(y), &bold);
    for item in &order.items {
        y -= LINE_STEP_MM;
        let title = books
            .iter()
            .find(|book| book._id == item.book)
            .map(|book| book.name.clone())
            .unwrap_or_else(|| item.book.to_hex());
        let subtotal = item.price_at_purchase * f64::from(item.qty);
        layer.use_text(
            format!(
                "{} x{} @ {:.2} = {:.2}",
                title, item.qty, item.price_at_purchase, subtotal
            ),
            11.0,
            Mm(MARGIN_MM),
            Mm(y),
            &regular,
        );
    }

    y -= LINE_STEP_MM * 2.0;
    layer.use_text(
        format!("Total: {:.2}", order.total),
        14.0,
        Mm(MARGIN_MM),
        Mm(y),
        &bold,
    );
    y -= LINE_STEP_MM;
    layer.use_text(
        format!("Order status: {}", order.status),
        11.0,
        Mm(MARGIN_MM),
        Mm(y),
        &regular,
    );
    y -= LINE_STEP_MM;
    layer.use_text(
        format!("Payment status: {}", order.payment_status),
        11.0,
        Mm(MARGIN_MM),
        Mm(y),
        &regular,
    );

    let bytes = doc.save_to_bytes()?;
    Ok(bytes)
}
