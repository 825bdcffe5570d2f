pub use sea_orm_migration::prelude::*;

mod m20260901_000001_create_wallets;
mod m20260901_000002_create_events;
mod m20260901_000003_create_meals;
mod m20260901_000004_create_classrooms;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260901_000001_create_wallets::Migration),
            Box::new(m20260901_000002_create_events::Migration),
            Box::new(m20260901_000003_create_meals::Migration),
            Box::new(m20260901_000004_create_classrooms::Migration),
        ]
    }
}
