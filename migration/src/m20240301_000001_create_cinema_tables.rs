use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cinema::Table)
                    .if_not_exists()
                    .col(pk_auto(Cinema::Id))
                    .col(string(Cinema::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cinema_name_unique")
                    .table(Cinema::Table)
                    .col(Cinema::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Auditorium::Table)
                    .if_not_exists()
                    .col(pk_auto(Auditorium::Id))
                    .col(integer(Auditorium::CinemaId))
                    .col(string(Auditorium::Name))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_auditorium_cinema")
                            .from(Auditorium::Table, Auditorium::CinemaId)
                            .to(Cinema::Table, Cinema::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auditorium_cinema_name_unique")
                    .table(Auditorium::Table)
                    .col(Auditorium::CinemaId)
                    .col(Auditorium::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Seat::Table)
                    .if_not_exists()
                    .col(pk_auto(Seat::Id))
                    .col(integer(Seat::AuditoriumId))
                    .col(integer(Seat::Row))
                    .col(integer(Seat::Number))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seat_auditorium")
                            .from(Seat::Table, Seat::AuditoriumId)
                            .to(Auditorium::Table, Auditorium::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seat_position_unique")
                    .table(Seat::Table)
                    .col(Seat::AuditoriumId)
                    .col(Seat::Row)
                    .col(Seat::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(string(Movie::Title))
                    .col(integer(Movie::Year))
                    .col(double_null(Movie::Rating))
                    .col(boolean(Movie::Current))
                    .col(string_null(Movie::BannerUrl))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string(User::FirstName))
                    .col(string(User::LastName))
                    .col(string_uniq(User::UserName))
                    .col(boolean(User::IsAdmin))
                    .col(boolean(User::IsSuperUser))
                    .col(boolean(User::IsUser))
                    .col(integer(User::BonusPoints))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Projection::Table)
                    .if_not_exists()
                    .col(pk_auto(Projection::Id))
                    .col(integer(Projection::MovieId))
                    .col(integer(Projection::AuditoriumId))
                    .col(big_integer(Projection::StartsAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projection_movie")
                            .from(Projection::Table, Projection::MovieId)
                            .to(Movie::Table, Movie::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projection_auditorium")
                            .from(Projection::Table, Projection::AuditoriumId)
                            .to(Auditorium::Table, Auditorium::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projection_auditorium_starts_at")
                    .table(Projection::Table)
                    .col(Projection::AuditoriumId)
                    .col(Projection::StartsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reservation::Table)
                    .if_not_exists()
                    .col(pk_auto(Reservation::Id))
                    .col(integer(Reservation::ProjectionId))
                    .col(integer(Reservation::SeatId))
                    .col(integer(Reservation::UserId))
                    .col(boolean(Reservation::Payment))
                    .col(string_null(Reservation::Message))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_projection")
                            .from(Reservation::Table, Reservation::ProjectionId)
                            .to(Projection::Table, Projection::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_seat")
                            .from(Reservation::Table, Reservation::SeatId)
                            .to(Seat::Table, Seat::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_user")
                            .from(Reservation::Table, Reservation::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_projection_seat_unique")
                    .table(Reservation::Table)
                    .col(Reservation::ProjectionId)
                    .col(Reservation::SeatId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Reservation::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Projection::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Seat::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Auditorium::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Cinema::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Cinema {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Auditorium {
    Table,
    Id,
    CinemaId,
    Name,
}

#[derive(DeriveIden)]
enum Seat {
    Table,
    Id,
    AuditoriumId,
    Row,
    Number,
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    Title,
    Year,
    Rating,
    Current,
    BannerUrl,
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    FirstName,
    LastName,
    UserName,
    IsAdmin,
    IsSuperUser,
    IsUser,
    BonusPoints,
}

#[derive(DeriveIden)]
enum Projection {
    Table,
    Id,
    MovieId,
    AuditoriumId,
    StartsAt,
}

#[derive(DeriveIden)]
enum Reservation {
    Table,
    Id,
    ProjectionId,
    SeatId,
    UserId,
    Payment,
    Message,
}
