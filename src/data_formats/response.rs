use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Article, Comment, User};

use super::wrapper::Tags;

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[derive(Deserialize, Serialize, Debug)]
pub struct UserResponse {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct ProfileResponse {
    pub username: String,
    pub bio: String,
    pub image: Option<String>,
    pub following: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ArticleResponse {
    slug: String,
    title: String,
    description: String,
    body: String,
    #[serde(flatten)]
    tag_list: Tags,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
    favorited: bool,
    #[serde(rename = "favoritesCount")]
    favorites_count: i64,
    author: ProfileResponse,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CommentResponse {
    id: i64,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
    body: String,
    author: ProfileResponse,
}

impl UserResponse {
    pub fn new(
        User {
            username,
            email,
            bio,
            image,
            ..
        }: User,
        token: String,
    ) -> Self {
        UserResponse {
            email,
            token,
            username,
            bio: bio.unwrap_or_default(),
            image,
        }
    }
}

impl ProfileResponse {
    pub fn new(
        User {
            username,
            bio,
            image,
            ..
        }: User,
        following: bool,
    ) -> Self {
        ProfileResponse {
            username,
            bio: bio.unwrap_or_default(),
            image,
            following,
        }
    }
}

impl ArticleResponse {
    pub fn new(
        Article {
            slug,
            title,
            description,
            body,
            tag_list,
            created_at,
            updated_at,
            favorited,
            favorites_count,
            author_username,
            author_bio,
            author_image,
            following,
            ..
        }: Article,
    ) -> Self {
        ArticleResponse {
            slug,
            title,
            description,
            body,
            tag_list: Tags {
                tags: tag_list
                    .map(|joined| joined.split(',').map(str::to_owned).collect())
                    .unwrap_or_default(),
            },
            created_at: format_timestamp(created_at),
            updated_at: format_timestamp(updated_at),
            favorited,
            favorites_count,
            author: ProfileResponse {
                username: author_username,
                bio: author_bio.unwrap_or_default(),
                image: author_image,
                following,
            },
        }
    }
}

impl CommentResponse {
    pub fn new(
        Comment {
            id,
            body,
            created_at,
            updated_at,
            author_username,
            author_bio,
            author_image,
            following,
            ..
        }: Comment,
    ) -> Self {
        CommentResponse {
            id,
            created_at: format_timestamp(created_at),
            updated_at: format_timestamp(updated_at),
            body,
            author: ProfileResponse {
                username: author_username,
                bio: author_bio.unwrap_or_default(),
                image: author_image,
                following,
            },
        }
    }
}
