//! Static "services" category sub-tree.
//!
//! Services are not backend categories; they are appended to whatever the
//! category endpoint returns so navigation always has them.

use bazaar_core::CategoryId;

use super::conversions::slugify;
use super::types::Category;

/// Id of the services root category.
pub const SERVICES_ROOT_ID: &str = "services";

const SERVICES: &[(&str, &str, &str)] = &[
    ("services-cleaning", "Cleaning", "Home and office cleaning"),
    ("services-repairs", "Repairs & Maintenance", "Plumbing, electrical and appliance repair"),
    ("services-beauty", "Beauty & Wellness", "Hair, makeup and spa services"),
    ("services-tailoring", "Tailoring", "Custom clothing and alterations"),
    ("services-events", "Event Planning", "Catering, decoration and event coordination"),
    ("services-logistics", "Logistics & Moving", "Dispatch riders and relocation"),
];

/// The services root plus its subcategories.
#[must_use]
pub fn services_categories() -> Vec<Category> {
    let root = Category {
        id: CategoryId::new(SERVICES_ROOT_ID),
        name: "Services".to_string(),
        slug: SERVICES_ROOT_ID.to_string(),
        level: 1,
        parent_id: None,
        description: Some("Book trusted local service providers".to_string()),
        image: None,
        product_count: None,
    };

    std::iter::once(root)
        .chain(SERVICES.iter().map(|(id, name, description)| Category {
            id: CategoryId::new(*id),
            name: (*name).to_string(),
            slug: slugify(name),
            level: 2,
            parent_id: Some(CategoryId::new(SERVICES_ROOT_ID)),
            description: Some((*description).to_string()),
            image: None,
            product_count: None,
        }))
        .collect()
}

/// Append the services sub-tree to backend categories, skipping ids the
/// backend already supplied.
#[must_use]
pub fn combine_with_services(mut categories: Vec<Category>) -> Vec<Category> {
    for service in services_categories() {
        if !categories.iter().any(|c| c.id == service.id) {
            categories.push(service);
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_tree_shape() {
        let services = services_categories();
        assert_eq!(services[0].level, 1);
        assert!(services[1..].iter().all(|c| {
            c.level == 2 && c.parent_id.as_ref().map(CategoryId::as_str) == Some(SERVICES_ROOT_ID)
        }));
    }

    #[test]
    fn test_combine_is_idempotent() {
        let once = combine_with_services(Vec::new());
        let twice = combine_with_services(once.clone());
        assert_eq!(once, twice);
    }
}
