//! Menu catalog: where a line's unit price comes from when it is added.

use serde::Serialize;

use groupcart_core::{MenuItemId, Price, SizeId};

/// Size used for items sold in a single size.
pub const REGULAR_SIZE: &str = "regular";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSize {
    pub size_id: SizeId,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub sizes: Vec<MenuSize>,
}

impl MenuItem {
    pub fn price_of(&self, size_id: &SizeId) -> Option<Price> {
        self.sizes
            .iter()
            .find(|s| &s.size_id == size_id)
            .map(|s| s.price)
    }
}

/// Read-only price lookup. Consulted once per add; later price changes never
/// affect lines already in a cart.
pub trait MenuCatalog: Send + Sync {
    fn price_of(&self, menu_item_id: &MenuItemId, size_id: &SizeId) -> Option<Price>;
}

impl<C: MenuCatalog + ?Sized> MenuCatalog for std::sync::Arc<C> {
    fn price_of(&self, menu_item_id: &MenuItemId, size_id: &SizeId) -> Option<Price> {
        (**self).price_of(menu_item_id, size_id)
    }
}

/// Fixed menu held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMenu {
    items: Vec<MenuItem>,
}

impl StaticMenu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn item(&self, menu_item_id: &MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|i| &i.menu_item_id == menu_item_id)
    }

    /// The storefront's house menu.
    pub fn house() -> Self {
        const SIZED: &[&str] = &["small", "medium", "large"];
        const SINGLE: &[&str] = &[REGULAR_SIZE];

        #[rustfmt::skip]
        let items: [(&str, &str, &str, &str, &[&str], &[u64]); 8] = [
            ("1", "Margherita Pizza", "Fresh mozzarella, tomato sauce, and basil", "Pizza", SIZED, &[1099, 1299, 1599]),
            ("2", "Pepperoni Pizza", "Spicy pepperoni with melted cheese", "Pizza", SIZED, &[1299, 1499, 1799]),
            ("3", "Quattro Formaggi", "Four cheese blend with mozzarella, gorgonzola, parmesan, and ricotta", "Pizza", SIZED, &[1499, 1699, 1999]),
            ("4", "Spaghetti Carbonara", "Eggs, cheese, pancetta, and black pepper", "Pasta", SINGLE, &[1399]),
            ("5", "Fettuccine Alfredo", "Creamy parmesan sauce with butter", "Pasta", SINGLE, &[1299]),
            ("6", "Caesar Salad", "Romaine lettuce, parmesan, croutons, and caesar dressing", "Salad", SINGLE, &[899]),
            ("7", "Garlic Bread", "Toasted bread with garlic butter and herbs", "Appetizer", SINGLE, &[499]),
            ("8", "Tiramisu", "Classic Italian dessert with coffee and mascarpone", "Dessert", SINGLE, &[699]),
        ];

        let items = items
            .into_iter()
            .filter_map(|(id, name, description, category, sizes, prices)| {
                Some(MenuItem {
                    menu_item_id: MenuItemId::new(id).ok()?,
                    name: name.to_string(),
                    description: description.to_string(),
                    category: category.to_string(),
                    sizes: sizes
                        .iter()
                        .zip(prices)
                        .filter_map(|(size, cents)| {
                            Some(MenuSize {
                                size_id: SizeId::new(*size).ok()?,
                                price: Price::from_cents(*cents),
                            })
                        })
                        .collect(),
                })
            })
            .collect();

        Self { items }
    }
}

impl MenuCatalog for StaticMenu {
    fn price_of(&self, menu_item_id: &MenuItemId, size_id: &SizeId) -> Option<Price> {
        self.item(menu_item_id)?.price_of(size_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn house_menu_prices_by_size() {
        let menu = StaticMenu::house();
        assert_eq!(menu.items().len(), 8);

        let margherita = MenuItemId::new("1").unwrap();
        assert_eq!(
            menu.price_of(&margherita, &SizeId::new("large").unwrap()),
            Some(Price::from_cents(1599))
        );
        assert_eq!(menu.price_of(&margherita, &SizeId::new(REGULAR_SIZE).unwrap()), None);

        let caesar = MenuItemId::new("6").unwrap();
        assert_eq!(
            menu.price_of(&caesar, &SizeId::new(REGULAR_SIZE).unwrap()),
            Some(Price::from_cents(899))
        );
    }

    #[test]
    fn unknown_item_has_no_price() {
        let menu = StaticMenu::house();
        assert_eq!(
            menu.price_of(&MenuItemId::new("99").unwrap(), &SizeId::new("small").unwrap()),
            None
        );
    }
}
