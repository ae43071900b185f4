//! Integration tests for the coupling between orders and product stock.
//!
//! These drive the aggregates directly, the way the orchestration layer does,
//! and check the ledger stays consistent across placement and cancellation.

use common::{Currency, CustomerId, Money, OrderId, StoreId};
use domain::{
    AggregateRoot, CommerceEvent, DeliveryAddress, InventoryError, MovementType,
    NewOrder, Order, OrderLine, OrderNumber, OrderStatus, PaymentMethod, Product, ProductEvent,
    StockLevel, catalog::ledger,
};

fn usd(minor: i64) -> Money {
    Money::from_minor(minor, Currency::usd())
}

fn stocked_product(store_id: StoreId, quantity: i64) -> Product {
    let mut product = Product::new(store_id, "Mug", usd(1000), StockLevel::with_policy(false, Some(2)));
    product
        .adjust_inventory(None, quantity, MovementType::Initial, "Initial stock", None)
        .unwrap();
    product
}

fn place_for(product: &Product, quantity: u32) -> Order {
    Order::place(NewOrder {
        id: OrderId::new(),
        store_id: product.store_id(),
        customer_id: CustomerId::new(),
        order_number: OrderNumber::new("ORD-260101-ABCDEFGH").unwrap(),
        lines: vec![OrderLine {
            product_id: product.id(),
            variant_id: None,
            product_name: product.name().to_string(),
            unit_price: product.price_for(None).unwrap(),
            quantity,
        }],
        delivery_fee: usd(500),
        delivery_address: DeliveryAddress::new("Ana", "1 Main St", "Springfield", "US"),
        payment_method: PaymentMethod::CashOnDelivery,
        customer_notes: None,
    })
    .unwrap()
}

mod placement {
    use super::*;

    #[test]
    fn reserving_stock_for_an_order_links_the_movement() {
        let mut product = stocked_product(StoreId::new(), 10);
        let order = place_for(&product, 2);

        let movement = product
            .adjust_inventory(
                None,
                -2,
                MovementType::Sale,
                format!("Order {}", order.order_number()),
                Some(order.id()),
            )
            .unwrap();

        assert_eq!(movement.quantity_change, -2);
        assert_eq!(movement.quantity_after, 8);
        assert_eq!(movement.order_id, Some(order.id()));
        assert_eq!(order.subtotal(), usd(2000));
        assert_eq!(order.total(), usd(2500));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn over_reservation_is_rejected_without_a_movement() {
        let mut product = stocked_product(StoreId::new(), 1);
        let order = place_for(&product, 2);

        let result =
            product.adjust_inventory(None, -2, MovementType::Sale, "order", Some(order.id()));
        assert!(matches!(result, Err(InventoryError::InsufficientStock { .. })));
        assert_eq!(product.pending_movements().len(), 1);
        assert_eq!(product.stock_level(None).unwrap().quantity(), 1);
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn cancel_releases_every_line_back_to_stock() {
        let mut product = stocked_product(StoreId::new(), 5);
        let mut order = place_for(&product, 4);
        product
            .adjust_inventory(None, -4, MovementType::Sale, "order", Some(order.id()))
            .unwrap();

        order.confirm().unwrap();
        let releases = order.cancel("Out of delivery range").unwrap();
        for release in releases {
            product
                .adjust_inventory(
                    release.variant_id,
                    i64::from(release.quantity),
                    MovementType::Return,
                    "Order cancelled",
                    Some(order.id()),
                )
                .unwrap();
        }

        assert_eq!(product.stock_level(None).unwrap().quantity(), 5);
        let movements = product.pending_movements();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[2].movement_type, MovementType::Return);
        assert_eq!(ledger::replay(movements).unwrap(), 5);
        assert!(ledger::verify_against(product.stock_level(None).unwrap(), movements).is_ok());
    }

    #[test]
    fn low_stock_is_reported_after_reservation() {
        let mut product = stocked_product(StoreId::new(), 3);
        let order = place_for(&product, 2);
        product
            .adjust_inventory(None, -2, MovementType::Sale, "order", Some(order.id()))
            .unwrap();

        let low = product.drain_events().into_iter().find(|envelope| {
            matches!(
                envelope.event,
                CommerceEvent::Product(ProductEvent::VariantStockLow(_))
            )
        });
        let low = low.expect("low stock event");
        assert_eq!(low.event_type(), "VariantStockLow");
        assert_eq!(low.aggregate_id, product.id().as_uuid());
    }
}
