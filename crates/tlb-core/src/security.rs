use std::collections::HashSet;

use crate::domain::MemberId;

// ============== Authorization ==============

/// Members allowed to manage twin lunches. Fixed for the process lifetime.
#[derive(Clone, Debug, Default)]
pub struct AdminAllowList {
    admins: HashSet<MemberId>,
}

impl AdminAllowList {
    pub fn new(admins: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Parse a comma-separated id list (`U1,U2`); blanks are ignored.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(MemberId::new),
        )
    }

    pub fn is_admin(&self, member: &MemberId) -> bool {
        self.admins.contains(member)
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}
