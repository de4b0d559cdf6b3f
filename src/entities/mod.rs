pub mod auditorium;
pub mod cinema;
pub mod movie;
pub mod movie_tag;
pub mod projection;
pub mod reservation;
pub mod seat;
pub mod tag;
pub mod user;
