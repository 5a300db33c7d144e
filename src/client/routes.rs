use crate::client::api::{Session, LOGIN_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Login,
    Register,
    Dashboard,
    Items,
    NewItem,
    ItemDetail(i64),
    EditItem(i64),
    Categories,
    CategoryDetail(i64),
    NotFound,
}

impl View {
    /// Matches a path, ignoring any query string, fragment or trailing slash.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => View::Home,
            ["login"] => View::Login,
            ["register"] => View::Register,
            ["dashboard"] => View::Dashboard,
            ["items"] => View::Items,
            ["items", "new"] => View::NewItem,
            ["items", id] => id.parse().map_or(View::NotFound, View::ItemDetail),
            ["items", id, "edit"] => id.parse().map_or(View::NotFound, View::EditItem),
            ["categories"] => View::Categories,
            ["categories", id] => id.parse().map_or(View::NotFound, View::CategoryDetail),
            _ => View::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            View::Home => "/".into(),
            View::Login => LOGIN_PATH.into(),
            View::Register => "/register".into(),
            View::Dashboard => "/dashboard".into(),
            View::Items => "/items".into(),
            View::NewItem => "/items/new".into(),
            View::ItemDetail(id) => format!("/items/{id}"),
            View::EditItem(id) => format!("/items/{id}/edit"),
            View::Categories => "/categories".into(),
            View::CategoryDetail(id) => format!("/categories/{id}"),
            View::NotFound => "/404".into(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, View::Home | View::Login | View::Register | View::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(View),
    Redirect(String),
}

/// Protected views need a stored token; the token itself is checked by the server.
pub fn resolve(path: &str, session: &Session) -> Navigation {
    let view = View::parse(path);
    if view.requires_auth() && !session.has_token() {
        tracing::debug!(path, "Redirecting unauthenticated navigation to login");
        return Navigation::Redirect(LOGIN_PATH.into());
    }
    Navigation::Render(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::api::MemoryTokenStore;

    #[test]
    fn parses_every_route() {
        assert_eq!(View::parse("/"), View::Home);
        assert_eq!(View::parse("/items/new"), View::NewItem);
        assert_eq!(View::parse("/items/7"), View::ItemDetail(7));
        assert_eq!(View::parse("/items/7/edit/"), View::EditItem(7));
        assert_eq!(View::parse("/categories/3?tab=items"), View::CategoryDetail(3));
        assert_eq!(View::parse("/items/abc"), View::NotFound);
        assert_eq!(View::parse("/settings"), View::NotFound);

        for view in [View::Dashboard, View::EditItem(4), View::CategoryDetail(9)] {
            assert_eq!(View::parse(&view.path()), view);
        }
    }

    #[test]
    fn protected_views_redirect_without_a_token() {
        let anonymous = Session::new(MemoryTokenStore::new());
        assert_eq!(resolve("/items", &anonymous), Navigation::Redirect("/login".into()));
        assert_eq!(resolve("/register", &anonymous), Navigation::Render(View::Register));
        assert_eq!(resolve("/nowhere", &anonymous), Navigation::Render(View::NotFound));

        let signed_in = Session::new(MemoryTokenStore::with_token("t"));
        assert_eq!(resolve("/items/2", &signed_in), Navigation::Render(View::ItemDetail(2)));
    }
}
