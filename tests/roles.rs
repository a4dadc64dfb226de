use little_lemon_api::middleware::auth::{DELIVERY_CREW_GROUP, MANAGER_GROUP, Role};
use little_lemon_api::routes::params::Pagination;

#[test]
fn no_groups_is_customer() {
    assert_eq!(
        Role::from_group_names(std::iter::empty::<&str>()),
        Role::Customer
    );
}

#[test]
fn manager_group_resolves_manager() {
    assert_eq!(Role::from_group_names([MANAGER_GROUP]), Role::Manager);
}

#[test]
fn delivery_crew_group_resolves_crew() {
    assert_eq!(
        Role::from_group_names([DELIVERY_CREW_GROUP]),
        Role::DeliveryCrew
    );
}

// A user in both groups is a manager, regardless of membership order.
#[test]
fn manager_wins_over_delivery_crew() {
    assert_eq!(
        Role::from_group_names([DELIVERY_CREW_GROUP, MANAGER_GROUP]),
        Role::Manager
    );
    assert_eq!(
        Role::from_group_names([MANAGER_GROUP, DELIVERY_CREW_GROUP]),
        Role::Manager
    );
}

#[test]
fn unknown_groups_are_ignored() {
    assert_eq!(
        Role::from_group_names(["Kitchen", "Front of house"]),
        Role::Customer
    );
}

#[test]
fn pagination_normalize_clamps() {
    let pagination = Pagination {
        page: Some(0),
        per_page: Some(1000),
    };
    let (page, per_page, offset) = pagination.normalize();
    assert_eq!(page, 1);
    assert_eq!(per_page, 100);
    assert_eq!(offset, 0);

    let default = Pagination {
        page: None,
        per_page: None,
    };
    assert_eq!(default.normalize(), (1, 20, 0));
}
