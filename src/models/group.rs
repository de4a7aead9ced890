use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::validation::{not_blank, valid_slug};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GroupForm {
    #[validate(
        custom = "not_blank",
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub title: String,

    #[validate(
        custom = "valid_slug",
        length(max = 50, message = "Ensure this value has at most 50 characters.")
    )]
    pub slug: String,

    #[validate(custom = "not_blank")]
    pub description: String,
}

impl GroupForm {
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            slug: self.slug.trim().to_string(),
            description: self.description.trim().to_string(),
        }
    }
}

impl From<&Group> for GroupForm {
    fn from(group: &Group) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        }
    }
}
