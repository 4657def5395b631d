use bson::DateTime;
use bson::oid::ObjectId;
use mongodb::Database;
use televisit_db::models::{User, UserRole};

use super::base::{BaseDao, DaoResult};

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(&self, name: String, role: UserRole) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            name,
            role,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<User>> {
        self.base.find_one(bson::doc! { "_id": id }).await
    }
}
