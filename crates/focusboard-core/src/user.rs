use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{ValidationError, require};
use crate::hooks::{Change, Hooks};
use crate::store::{Store, USER_KEY};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    /// Opaque image payload (e.g. a data URL).
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserProfile {
    pub fn new(username: &str) -> Result<Self, ValidationError> {
        let username = require("username", username)?;
        Ok(Self {
            display_name: username.clone(),
            username,
            avatar: None,
        })
    }

    pub fn greeting_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

pub struct ProfileManager {
    store: Rc<Store>,
    profile: Option<UserProfile>,
    hooks: Hooks,
}

impl ProfileManager {
    #[instrument(skip_all)]
    pub fn load(store: Rc<Store>) -> Self {
        let profile: Option<UserProfile> = store.get(USER_KEY);
        info!(present = profile.is_some(), "loaded user profile");
        Self {
            store,
            profile,
            hooks: Hooks::new(),
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    #[instrument(skip(self, profile), fields(username = %profile.username))]
    pub fn save(&mut self, profile: UserProfile) -> Result<&UserProfile, ValidationError> {
        require("username", &profile.username)?;
        self.store.set(USER_KEY, &profile);
        self.hooks.emit(Change::Profile);
        info!("saved user profile");
        Ok(self.profile.insert(profile))
    }

    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        if self.profile.take().is_some() {
            self.store.remove(USER_KEY);
            self.hooks.emit(Change::Profile);
            info!("cleared user profile");
        }
    }
}
