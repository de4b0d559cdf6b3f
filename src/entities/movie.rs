use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub current: bool,
    pub banner_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::projection::Entity")]
    Projection,
    #[sea_orm(has_many = "super::movie_tag::Entity")]
    MovieTag,
}

impl Related<super::projection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projection.def()
    }
}

impl Related<super::movie_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieTag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
