use crate::database::{DatabaseError, Store, Visibility};
use crate::middleware::AuthUser;

/// Rows `user` may see: administrators see everything, everyone else only
/// the objects they are appointed to
pub async fn visibility_for(store: &dyn Store, user: &AuthUser) -> Result<Visibility, DatabaseError> {
    if user.is_admin() {
        return Ok(Visibility::All);
    }
    let ids = store.appointed_object_ids(user.id).await?;
    Ok(Visibility::Objects(ids))
}
