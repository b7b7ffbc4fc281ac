use crate::server::ServerRouter;

mod tweets;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(tweets::routes())
        .merge(users::routes())
}
