use crate::{
    auth::Claims,
    errors::{AppError, AppResult},
    models::domain::Role,
};

pub fn require_role(claims: &Claims, allowed: &[Role]) -> AppResult<()> {
    if !allowed.contains(&claims.role) {
        return Err(AppError::Forbidden(format!(
            "Role {:?} cannot perform this action",
            claims.role
        )));
    }
    Ok(())
}
