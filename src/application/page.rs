use crate::domain::entities::UserProfile;

/// Outcome of resolving the caller's identity for one page render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_loaded: bool,
    pub is_signed_in: bool,
    pub user: Option<UserProfile>,
}

impl AuthSnapshot {
    /// Resolution did not finish; `claimed` records whether a credential was
    /// presented.
    pub fn pending(claimed: bool) -> Self {
        Self {
            is_loaded: false,
            is_signed_in: claimed,
            user: None,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            is_loaded: true,
            is_signed_in: false,
            user: None,
        }
    }

    pub fn signed_in(user: UserProfile) -> Self {
        Self {
            is_loaded: true,
            is_signed_in: true,
            user: Some(user),
        }
    }
}

/// Which shell the home page renders. Computed once per render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    AuthPending,
    SignedOut,
    SignedIn(Option<UserProfile>),
}

impl PageState {
    pub fn from_auth(auth: &AuthSnapshot) -> Self {
        if !auth.is_loaded {
            return PageState::AuthPending;
        }
        if auth.is_signed_in {
            PageState::SignedIn(auth.user.clone())
        } else {
            PageState::SignedOut
        }
    }

    pub fn shows_sign_in(&self) -> bool {
        matches!(self, PageState::SignedOut)
    }

    /// The composer needs a profile to show the author's avatar.
    pub fn composer_user(&self) -> Option<&UserProfile> {
        match self {
            PageState::SignedIn(user) => user.as_ref(),
            _ => None,
        }
    }

    pub fn renders_content(&self) -> bool {
        !matches!(self, PageState::AuthPending)
    }
}
