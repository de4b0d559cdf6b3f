use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .if_not_exists()
                    .col(pk_auto(Tag::Id))
                    .col(string_uniq(Tag::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieTag::Table)
                    .if_not_exists()
                    .col(integer(MovieTag::MovieId))
                    .col(integer(MovieTag::TagId))
                    .primary_key(Index::create().col(MovieTag::MovieId).col(MovieTag::TagId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_tag_movie")
                            .from(MovieTag::Table, MovieTag::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_tag_tag")
                            .from(MovieTag::Table, MovieTag::TagId)
                            .to(Tag::Table, Tag::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_tag_tag")
                    .table(MovieTag::Table)
                    .col(MovieTag::TagId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieTag::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Tag::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tag {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum MovieTag {
    Table,
    MovieId,
    TagId,
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
}
