//! Route templates for the three applications.
//!
//! Templates use the router's `{name}` / `{*name}` capture syntax, so the same
//! string both mounts a handler and, with [`fill`], builds links to it.

use serde::Deserialize;

/// Joins an application prefix such as `imposter/` with a route template.
pub fn mount(prefix: &str, route: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        route.to_string()
    } else {
        format!("/{}{}", prefix, route)
    }
}

/// Substitutes captures in a route template with percent-encoded values.
pub fn fill(template: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(template.to_string(), |path, (name, value)| {
        let encoded = urlencoding::encode(value);
        path.replace(&format!("{{{}}}", name), &encoded)
            .replace(&format!("{{*{}}}", name), value)
    })
}

/// Mounted path with captures filled in.
pub fn path(prefix: &str, template: &str, params: &[(&str, &str)]) -> String {
    mount(prefix, &fill(template, params))
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminRoutes {
    pub static_files: String,
    pub index: String,
    pub login: String,
    pub logout: String,
    pub posts_list: String,
    pub pages_list: String,
    pub new_post: String,
    pub edit_post: String,
    pub save_new_post: String,
    pub save_post: String,
    pub new_page: String,
    pub edit_page: String,
    pub save_new_page: String,
    pub save_page: String,
    pub recalculate_tagcounts: String,
}

impl Default for AdminRoutes {
    fn default() -> Self {
        Self {
            static_files: "/static/{*path}".into(),
            index: "/".into(),
            login: "/login".into(),
            logout: "/logout".into(),
            posts_list: "/posts/{page}".into(),
            pages_list: "/pages/{page}".into(),
            new_post: "/post/new/edit".into(),
            edit_post: "/post/{id}/edit".into(),
            save_new_post: "/post/new/save".into(),
            save_post: "/post/{id}/save".into(),
            new_page: "/page/new/edit".into(),
            edit_page: "/page/{id}/edit".into(),
            save_new_page: "/page/new/save".into(),
            save_page: "/page/{id}/save".into(),
            recalculate_tagcounts: "/tags/recalculate".into(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FrontendRoutes {
    pub static_files: String,
    pub uploads: String,
    pub index: String,
    pub postlist: String,
    pub postlist_by_year_index: String,
    pub postlist_by_year: String,
    pub postlist_by_month_index: String,
    pub postlist_by_month: String,
    pub postlist_by_tag_index: String,
    pub postlist_by_tag: String,
    pub postlist_by_username_index: String,
    pub postlist_by_username: String,
    pub post: String,
    pub page: String,
    pub rss: String,
    pub atom: String,
}

impl Default for FrontendRoutes {
    fn default() -> Self {
        Self {
            static_files: "/static/{*path}".into(),
            uploads: "/uploads/{*path}".into(),
            index: "/".into(),
            postlist: "/list/{page}".into(),
            postlist_by_year_index: "/{year}".into(),
            postlist_by_year: "/{year}/list/{page}".into(),
            postlist_by_month_index: "/{year}/{month}".into(),
            postlist_by_month: "/{year}/{month}/list/{page}".into(),
            postlist_by_tag_index: "/tag/{tag}".into(),
            postlist_by_tag: "/tag/{tag}/list/{page}".into(),
            postlist_by_username_index: "/user/{username}".into(),
            postlist_by_username: "/user/{username}/list/{page}".into(),
            post: "/{year}/{month}/{day}/{slug}".into(),
            page: "/page/{slug}".into(),
            rss: "/feed/rss".into(),
            atom: "/feed/atom".into(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiRoutes {
    pub post_by_slug: String,
    pub status_by_id: String,
    pub format_by_id: String,
    pub user_by_id: String,
    pub sluglist_latest: String,
    pub posts_latest: String,
    pub statuslist: String,
    pub taglist: String,
    pub sluglist_by_tag: String,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            post_by_slug: "/post/{slug}".into(),
            status_by_id: "/status/{id}".into(),
            format_by_id: "/format/{id}".into(),
            user_by_id: "/user/{id}".into(),
            sluglist_latest: "/posts/slugs/latest".into(),
            posts_latest: "/posts/latest".into(),
            statuslist: "/statuses".into(),
            taglist: "/tags".into(),
            sluglist_by_tag: "/tag/{tag}/slugs".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_without_prefix_keeps_route() {
        assert_eq!(mount("", "/feed/rss"), "/feed/rss");
        assert_eq!(mount("/", "/"), "/");
    }

    #[test]
    fn mount_normalises_prefix_slashes() {
        assert_eq!(mount("imposter/", "/feed/rss"), "/imposter/feed/rss");
        assert_eq!(mount("/imposter", "/"), "/imposter/");
    }

    #[test]
    fn fill_encodes_segments() {
        let routes = FrontendRoutes::default();
        assert_eq!(
            fill(&routes.postlist_by_tag, &[("tag", "rust lang"), ("page", "2")]),
            "/tag/rust%20lang/list/2"
        );
        assert_eq!(
            fill(
                &routes.post,
                &[("year", "2010"), ("month", "05"), ("day", "04"), ("slug", "hello")]
            ),
            "/2010/05/04/hello"
        );
    }

    #[test]
    fn fill_keeps_wildcard_slashes() {
        assert_eq!(
            path("blog", "/static/{*path}", &[("path", "css/site.css")]),
            "/blog/static/css/site.css"
        );
    }
}
