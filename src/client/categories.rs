use crate::categories::CategoryInput;
use crate::client::api::{ApiClient, ClientError};
use crate::models::{Category, CategoryDetail, CategoryWithCount};

pub struct CategoryStore {
    api: ApiClient,
    pub categories: Vec<CategoryWithCount>,
    pub current_category: Option<CategoryDetail>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CategoryStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            categories: Vec::new(),
            current_category: None,
            loading: false,
            error: None,
        }
    }

    pub fn get_by_id(&self, id: i64) -> Option<&CategoryWithCount> {
        self.categories.iter().find(|c| c.category.id == id)
    }

    pub async fn fetch_categories(&mut self, search: Option<&str>) -> Result<(), ClientError> {
        let query: Vec<(String, String)> = search
            .filter(|s| !s.is_empty())
            .map(|s| vec![("search".to_string(), s.to_string())])
            .unwrap_or_default();

        self.begin();
        let result = self.api.get::<Vec<CategoryWithCount>>("/categories", &query).await;
        let categories = self.settle(result, "Failed to fetch categories")?;
        self.categories = categories;
        Ok(())
    }

    pub async fn fetch_category(&mut self, id: i64) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.get::<CategoryDetail>(&format!("/categories/{id}"), &[]).await;
        let detail = self.settle(result, "Failed to fetch category")?;
        self.current_category = Some(detail);
        Ok(())
    }

    pub async fn create(&mut self, input: &CategoryInput) -> Result<Category, ClientError> {
        self.begin();
        let result = self.api.post::<_, Category>("/categories", input).await;
        let category = self.settle(result, "Failed to create category")?;
        self.categories.push(CategoryWithCount {
            category: category.clone(),
            clothing_items_count: 0,
        });
        Ok(category)
    }

    pub async fn update(&mut self, id: i64, input: &CategoryInput) -> Result<Category, ClientError> {
        self.begin();
        let result = self.api.put::<_, Category>(&format!("/categories/{id}"), input).await;
        let category = self.settle(result, "Failed to update category")?;
        if let Some(existing) = self.categories.iter_mut().find(|c| c.category.id == id) {
            existing.category = category.clone();
        }
        if let Some(current) = self.current_category.as_mut().filter(|c| c.category.id == id) {
            current.category = category.clone();
        }
        Ok(category)
    }

    /// A category that still has items comes back as [`ClientError::Conflict`].
    pub async fn delete(&mut self, id: i64) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.delete(&format!("/categories/{id}")).await;
        self.settle(result, "Failed to delete category")?;
        self.categories.retain(|c| c.category.id != id);
        if self.current_category.as_ref().is_some_and(|c| c.category.id == id) {
            self.current_category = None;
        }
        Ok(())
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn settle<T>(&mut self, result: Result<T, ClientError>, fallback: &str) -> Result<T, ClientError> {
        self.loading = false;
        result.inspect_err(|err| self.error = Some(err.message_or(fallback)))
    }
}
