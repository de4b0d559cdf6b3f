use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One cell of an auditorium's seat grid. `(auditorium_id, row, number)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "seat")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub auditorium_id: i32,
    pub row: i32,
    pub number: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::auditorium::Entity",
        from = "Column::AuditoriumId",
        to = "super::auditorium::Column::Id"
    )]
    Auditorium,
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservation,
}

impl Related<super::auditorium::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Auditorium.def()
    }
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
