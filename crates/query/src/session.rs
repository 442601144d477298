//! The logged-in user of a context.
//!
//! Credentials are checked against the `users` table. Every attempt is
//! traced with its outcome; the password never is.

use crate::constraint::{Comparator, Constraint, ConstraintSet};
use crate::context::Context;
use quarry_core::{Error, Result};
use quarry_storage::{Connection, Cursor, Statement};
use std::cell::RefCell;
use tracing::{info, warn};

/// Table holding the accounts that may log in.
pub const USERS_TABLE: &str = "users";
const USER_ID: &str = "User_ID";
const USER_NAME: &str = "User_Name";
const PASSWORD: &str = "Password";

#[derive(Clone, Debug)]
struct SessionUser {
    id: Option<i64>,
    name: String,
}

/// Session state held by the context.
#[derive(Debug, Default)]
pub(crate) struct Session {
    user: RefCell<Option<SessionUser>>,
}

impl Session {
    pub(crate) fn begin(&self, id: Option<i64>, name: String) {
        *self.user.borrow_mut() = Some(SessionUser { id, name });
    }
}

impl Context {
    /// Returns the name of the logged-in user.
    pub fn user_name(&self) -> Option<String> {
        self.session.user.borrow().as_ref().map(|u| u.name.clone())
    }

    /// Returns the id of the logged-in user, when it came from the users table.
    pub fn user_id(&self) -> Option<i64> {
        self.session.user.borrow().as_ref().and_then(|u| u.id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.user.borrow().is_some()
    }

    /// Logs in after checking the credentials against the users table.
    ///
    /// Fails with [`Error::Authentication`] if someone is already logged in
    /// or the credentials match no account.
    pub fn login(&self, user_name: &str, password: &str) -> Result<()> {
        if let Some(current) = self.user_name() {
            return Err(Error::authentication(format!(
                "already logged in as {}",
                current
            )));
        }

        match self.authenticate(user_name, password)? {
            Some(id) => {
                info!(user = user_name, success = true, "login attempt");
                self.session.begin(id, user_name.to_string());
                Ok(())
            }
            None => {
                warn!(user = user_name, success = false, "login attempt");
                Err(Error::authentication("user name or password rejected"))
            }
        }
    }

    /// Logs out. Returns the name of the user who was logged in.
    pub fn logout(&self) -> Option<String> {
        let previous = self.session.user.borrow_mut().take();
        if let Some(user) = &previous {
            info!(user = %user.name, "logout");
        }
        previous.map(|u| u.name)
    }

    /// Looks up an account. Returns `Some(id)` if the credentials match.
    fn authenticate(&self, user_name: &str, password: &str) -> Result<Option<Option<i64>>> {
        let mut credentials = ConstraintSet::new();
        credentials.insert(Constraint::new(USER_NAME, Comparator::Eq, user_name));
        credentials.insert(Constraint::new(PASSWORD, Comparator::Eq, password));
        let text = credentials.render_query(USERS_TABLE);

        let statement = self.connection()?.create_statement()?;
        let found = statement.execute_query(&text).and_then(|cursor| {
            if cursor.next()? {
                Ok(Some(cursor.get_by_name(USER_ID).ok().and_then(|id| id.as_i64())))
            } else {
                Ok(None)
            }
        });
        statement.close();
        found
    }
}
