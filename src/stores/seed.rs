use crate::models::user::{Role, User};
use std::collections::BTreeMap;

pub const ADMIN_ID: &str = "kkkk1111";
pub const WORKER_ID: &str = "kkkk2222";

/// Default records present before any persisted data is loaded
pub fn bootstrap_users() -> BTreeMap<String, User> {
    let admin = User::new(
        ADMIN_ID,
        ADMIN_ID,
        "管理者",
        "admin@pointmoney.com",
        Role::Admin,
        "2024-01-01",
    );
    let worker = User::new(
        WORKER_ID,
        WORKER_ID,
        "テストワーカー",
        "worker@pointmoney.com",
        Role::Worker,
        "2024-01-15",
    );

    [admin, worker]
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserStatus;

    #[test]
    fn test_bootstrap_set() {
        let users = bootstrap_users();
        assert_eq!(users.len(), 2);

        let admin = &users[ADMIN_ID];
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.points, 0);
        assert_eq!(admin.total_earned, 0);
        assert_eq!(admin.joined_at, "2024-01-01");

        let worker = &users[WORKER_ID];
        assert_eq!(worker.role, Role::Worker);
        assert_eq!(worker.status, UserStatus::Active);
        assert_eq!(worker.joined_at, "2024-01-15");
    }
}
