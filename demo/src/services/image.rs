use async_trait::async_trait;
use mssql_fluent::prelude::*;

const SELECT_IMAGE: &str =
    "SELECT ThumbNailPhoto FROM Production.ProductPhoto WHERE ProductPhotoID = @Id";

const UPDATE_IMAGE: &str =
    "UPDATE Production.ProductPhoto SET ThumbNailPhoto = @Image WHERE ProductPhotoID = @Id";

#[async_trait]
pub(crate) trait ImageService {
    async fn get(&self, id: i32) -> Result<Option<Vec<u8>>>;
    async fn save(&self, id: i32, data: &[u8]) -> Result<usize>;
}

/// Thumbnail photos as `varbinary(max)`.
pub(crate) struct ProductPhotoService {
    builder: SqlServerStatementBuilder,
}

impl ProductPhotoService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl ImageService for ProductPhotoService {
    async fn get(&self, id: i32) -> Result<Option<Vec<u8>>> {
        self.builder
            .build()?
            .set_sql(SELECT_IMAGE)
            .add_in_parameter("Id", id)
            .scalar_binary()
            .await
    }

    async fn save(&self, id: i32, data: &[u8]) -> Result<usize> {
        self.builder
            .build()?
            .set_sql(UPDATE_IMAGE)
            .add_in_parameter("Image", data)
            .add_in_parameter("Id", id)
            .execute()
            .await
    }
}
