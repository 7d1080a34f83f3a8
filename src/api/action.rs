use std::fmt;
use std::str::FromStr;

/// The fixed set of operations selected by the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Register,
    Login,
    CreatePost,
    GetPosts,
    GetPendingPosts,
    ApprovePost,
    DeletePost,
    GetUsers,
    DeleteUser,
    SuspendUser,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Register,
        Action::Login,
        Action::CreatePost,
        Action::GetPosts,
        Action::GetPendingPosts,
        Action::ApprovePost,
        Action::DeletePost,
        Action::GetUsers,
        Action::DeleteUser,
        Action::SuspendUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
            Action::CreatePost => "create_post",
            Action::GetPosts => "get_posts",
            Action::GetPendingPosts => "get_pending_posts",
            Action::ApprovePost => "approve_post",
            Action::DeletePost => "delete_post",
            Action::GetUsers => "get_users",
            Action::DeleteUser => "delete_user",
            Action::SuspendUser => "suspend_user",
        }
    }

    /// Actions that take a JSON body and must arrive as POST.
    pub fn takes_body(&self) -> bool {
        !matches!(
            self,
            Action::GetPosts | Action::GetPendingPosts | Action::GetUsers
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
