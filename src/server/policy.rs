//! one declarative table of which roles may run which bill operation,
//! consulted once per staff request instead of ad-hoc checks per handler

use crate::server::controller::error::CustomError;
use crate::server::model::user::{LoggedUser, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BillOperation {
    OpenConfirmed,
    OpenInstant,
    AddConfirmedItems,
    Confirm,
    Close,
    Decline,
    ConfirmItems,
    DeclineItems,
    RemoveItems,
    ListByRange,
}

const ELEVATED: &[Role] = &[Role::Admin, Role::Cook];
const ANY_STAFF: &[Role] = &[Role::Admin, Role::Cook, Role::Waiter];

pub(crate) fn required_roles(operation: BillOperation) -> &'static [Role] {
    match operation {
        BillOperation::OpenInstant
        | BillOperation::AddConfirmedItems
        | BillOperation::Decline => ELEVATED,
        BillOperation::OpenConfirmed
        | BillOperation::Confirm
        | BillOperation::Close
        | BillOperation::ConfirmItems
        | BillOperation::DeclineItems
        | BillOperation::RemoveItems
        | BillOperation::ListByRange => ANY_STAFF,
    }
}

pub(crate) fn authorize(user: &LoggedUser, operation: BillOperation) -> Result<(), CustomError> {
    if required_roles(operation).contains(&user.role) {
        return Ok(());
    }
    Err(CustomError::forbidden(denial_message(operation)))
}

fn denial_message(operation: BillOperation) -> &'static str {
    match operation {
        BillOperation::OpenInstant | BillOperation::AddConfirmedItems => {
            "You do not have permission to add confirmed items to bills"
        }
        BillOperation::Decline => "You are not allowed to decline a bill",
        _ => "You do not have permission to perform this operation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> LoggedUser {
        LoggedUser {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            role,
        }
    }

    #[test]
    fn elevated_operations_reject_waiters() {
        for op in [
            BillOperation::OpenInstant,
            BillOperation::AddConfirmedItems,
            BillOperation::Decline,
        ] {
            assert!(authorize(&user(Role::Admin), op).is_ok());
            assert!(authorize(&user(Role::Cook), op).is_ok());
            assert!(matches!(
                authorize(&user(Role::Waiter), op),
                Err(CustomError::Forbidden { .. })
            ));
        }
    }

    #[test]
    fn every_staff_role_may_run_the_rest() {
        for op in [
            BillOperation::OpenConfirmed,
            BillOperation::Confirm,
            BillOperation::Close,
            BillOperation::ConfirmItems,
            BillOperation::DeclineItems,
            BillOperation::RemoveItems,
            BillOperation::ListByRange,
        ] {
            for role in [Role::Admin, Role::Cook, Role::Waiter] {
                assert!(authorize(&user(role), op).is_ok());
            }
        }
    }
}
