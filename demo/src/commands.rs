use chrono::{Local, NaiveTime, Timelike};
use serde::Serialize;
use tracing::{error, info};

use mssql_fluent::prelude::*;

use crate::args::Scenario;
use crate::error::DemoResult;
use crate::models::Department;
use crate::services::{
    CrudService, DepartmentCrudService, DepartmentHistoryService, DepartmentShiftService,
    DepartmentTransactionService, HierarchyService, ImageService, MarsService, PrepareService,
    ProductPhotoService, ReadService, StoreSurveyService, TransactionService, XmlService,
};

const GROUP_NAME: &str = "Research and Development";
const PRODUCT_PHOTO_ID: i32 = 70;
const STORE_ID: i32 = 298;
const SALES_PERSON_ID: i32 = 281;
const PREPARE_DEPARTMENT_ID: i16 = 1;
const PREPARE_EMPLOYEES: [i32; 7] = [2, 3, 4, 5, 6, 14, 15];

fn pretty<T: Serialize>(value: &T) -> DemoResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn new_department(days_ago: i64) -> Department {
    let today = Local::now().date_naive().and_time(NaiveTime::MIN);
    Department {
        name: Some("Information Technology".into()),
        group_name: Some("Executive General and Administration".into()),
        modified_date: today - chrono::Duration::days(days_ago),
        ..Department::default()
    }
}

/// Runs the scenarios against one connection string.
pub(crate) struct Commands {
    statements: SqlServerStatementBuilder,
    transactions: SqlServerTransactionBuilder,
}

impl Commands {
    pub(crate) fn new(settings: &AppSettings, connection: &str) -> Result<Self> {
        Ok(Self {
            statements: SqlServerStatementBuilder::new(settings, connection)?,
            transactions: SqlServerTransactionBuilder::new(settings, connection)?,
        })
    }

    pub(crate) async fn run(&self, scenario: Scenario) -> DemoResult<()> {
        for one in scenario.expand() {
            info!(scenario = ?one, "running");
            if let Err(e) = self.run_one(one).await {
                error!(scenario = ?one, "scenario failed: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn run_one(&self, scenario: Scenario) -> DemoResult<()> {
        match scenario {
            // expanded by run()
            Scenario::All => Ok(()),
            Scenario::Crud => self.crud().await,
            Scenario::Read => self.read().await,
            Scenario::Mars => self.mars().await,
            Scenario::Transaction => self.transaction().await,
            Scenario::Prepare => self.prepare().await,
            Scenario::Image => self.image().await,
            Scenario::Xml => self.xml().await,
        }
    }

    async fn crud(&self) -> DemoResult<()> {
        let service = DepartmentCrudService::new(self.statements.clone());
        let mut department = new_department(1);

        info!("Creating Department '{}'...", department.name.as_deref().unwrap_or_default());
        department.id = service.create(&department).await?;

        info!("Reading Department {}...", department.id);
        department = service.read(department.id).await?;
        info!("Department\n{}", pretty(&department)?);

        department.modified_date = new_department(0).modified_date;
        info!("Updating Department {}...", department.id);
        service.update(&department).await?;
        info!("Department\n{}", pretty(&department)?);

        info!("Deleting Department {}...", department.id);
        service.delete(department.id).await?;
        Ok(())
    }

    async fn read(&self) -> DemoResult<()> {
        let service = HierarchyService::new(self.statements.clone());
        for business_entity_id in [16, 2] {
            info!("Reading Hierarchy of BusinessEntityID {business_entity_id}...");
            let hierarchies = service.read(business_entity_id).await?;
            info!("Hierarchies:\n{}", pretty(&hierarchies)?);
        }
        Ok(())
    }

    async fn mars(&self) -> DemoResult<()> {
        let service = DepartmentShiftService::new(self.statements.clone());
        info!("Reading Departments of '{GROUP_NAME}'...");
        let departments = service.read(GROUP_NAME).await?;
        info!("Departments:\n{}", pretty(&departments)?);
        Ok(())
    }

    async fn transaction(&self) -> DemoResult<()> {
        let service = DepartmentTransactionService::new(self.transactions.clone());
        let mut department = new_department(0);

        info!("Creating Department and its history...");
        department.id = service.create(&department).await?;
        info!("Department:\n{}", pretty(&department)?);

        info!("Deleting Department {} and its history...", department.id);
        service.delete(&department).await?;
        Ok(())
    }

    async fn prepare(&self) -> DemoResult<()> {
        let service = DepartmentHistoryService::new(self.statements.clone());

        info!("Inserting ShiftID 3 into EmployeeDepartmentHistory for Department {PREPARE_DEPARTMENT_ID}...");
        let inserted = service.insert(PREPARE_DEPARTMENT_ID, &PREPARE_EMPLOYEES).await?;
        info!(inserted, "history rows inserted");

        info!("Deleting ShiftID 3 from EmployeeDepartmentHistory for Department {PREPARE_DEPARTMENT_ID}...");
        let deleted = service.delete(PREPARE_DEPARTMENT_ID, &PREPARE_EMPLOYEES).await?;
        info!(deleted, "history rows deleted");
        Ok(())
    }

    async fn image(&self) -> DemoResult<()> {
        let service = ProductPhotoService::new(self.statements.clone());
        let image_file = std::env::temp_dir().join(format!("ThumbnailProduct{PRODUCT_PHOTO_ID}"));

        info!("Reading image of ProductPhotoID {PRODUCT_PHOTO_ID}...");
        let Some(image) = service.get(PRODUCT_PHOTO_ID).await? else {
            info!("ProductPhotoID {PRODUCT_PHOTO_ID} has no thumbnail");
            return Ok(());
        };

        info!("Creating file '{}'...", image_file.display());
        tokio::fs::write(&image_file, &image).await?;

        let result = async {
            info!("Reading file '{}'...", image_file.display());
            let saved = tokio::fs::read(&image_file).await?;
            info!("Updating image of ProductPhotoID {PRODUCT_PHOTO_ID} ({} bytes)...", saved.len());
            service.save(PRODUCT_PHOTO_ID, &saved).await?;
            DemoResult::<()>::Ok(())
        }
        .await;

        tokio::fs::remove_file(&image_file).await?;
        result
    }

    async fn xml(&self) -> DemoResult<()> {
        let service = StoreSurveyService::new(self.statements.clone());

        info!("Reading Store Survey of BusinessEntityID {STORE_ID}...");
        let Some(mut survey) = service.find(STORE_ID).await? else {
            info!("Store {STORE_ID} not found");
            return Ok(());
        };
        info!("Store Survey:\n{}", pretty(&survey)?);

        survey.annual_sales = i32::try_from(Local::now().second()).unwrap_or_default() * 100_000;
        info!("Updating Store Survey of SalesPersonID {SALES_PERSON_ID}...");
        let updated = service.update(SALES_PERSON_ID, &survey).await?;
        info!(updated, "stores updated");

        info!("Reading Store Surveys of SalesPersonID {SALES_PERSON_ID}...");
        let surveys = service.read(SALES_PERSON_ID).await?;
        info!("Store Surveys:\n{}", pretty(&surveys)?);
        Ok(())
    }
}
