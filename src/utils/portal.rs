use std::time::Duration;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use scraper::{Html, Selector};
use thirtyfour::{prelude::*, WindowHandle};
use tokio::time::{sleep, Instant};
use crate::checker::GradeSource;
use crate::config::PortalConfig;
use crate::models::{GradeRecord, GradeSnapshot, COURSE_COLUMN, GRADE_COLUMN};

const STUDENT_ID_INPUT: &str = r#"input[placeholder="请输入学号/职工号"]"#;
const PASSWORD_INPUT: &str = r#"input[placeholder="请输入密码"]"#;
const LOGIN_BUTTON: &str = "div.longBtn";
// "更多" link of the grade widget, opens the full table in a new tab.
const GRADES_LINK: &str = "#cjgd a";
const GRADE_ROWS: &str = "table#tabGrid tbody tr.jqgrow";
const GRADE_TABLE: &str = "table#tabGrid";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Logs into the academic portal through a WebDriver-controlled Chrome and reads the grade table.
pub struct PortalFetcher {
    config: PortalConfig,
}

impl PortalFetcher {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<WebDriver> {
        let mut args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--window-size=1920,1080",
        ];
        if self.config.headless {
            args.push("--headless=new");
            args.push("--disable-gpu");
        }

        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_option("args", args)?;

        WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .with_context(|| format!("Failed to connect to WebDriver at {}", self.config.webdriver_url))
    }

    // Everything between opening and quitting the browser. Kept separate so the
    // caller can quit the session whatever this returns.
    async fn scrape(&self, driver: &WebDriver, student_id: &str, password: &str) -> Result<GradeSnapshot> {
        driver
            .goto(self.config.login_url.as_str())
            .await
            .context("Failed to open the login page")?;

        driver
            .find(By::Css(STUDENT_ID_INPUT))
            .await
            .context("Student ID field not found")?
            .send_keys(student_id)
            .await
            .context("Failed to type the student ID")?;
        driver
            .find(By::Css(PASSWORD_INPUT))
            .await
            .context("Password field not found")?
            .send_keys(password)
            .await
            .context("Failed to type the password")?;
        driver
            .find(By::Css(LOGIN_BUTTON))
            .await
            .context("Login button not found")?
            .click()
            .await
            .context("Failed to submit the login form")?;

        let known = driver.windows().await.context("Failed to list browser windows")?;
        driver
            .query(By::Css(GRADES_LINK))
            .wait(self.config.table_timeout, POLL_INTERVAL)
            .first()
            .await
            .context("Grades link not found, login probably failed")?
            .click()
            .await
            .context("Failed to open the grades page")?;

        let grades_tab = wait_for_new_window(driver, &known, self.config.table_timeout).await?;
        driver
            .switch_to_window(grades_tab)
            .await
            .context("Failed to switch to the grades tab")?;

        driver
            .query(By::Css(GRADE_ROWS))
            .wait(self.config.table_timeout, POLL_INTERVAL)
            .first()
            .await
            .with_context(|| format!("Grade table did not load within {}s", self.config.table_timeout.as_secs()))?;

        let table_html = driver
            .find(By::Css(GRADE_TABLE))
            .await
            .context("Grade table not found")?
            .outer_html()
            .await
            .context("Failed to read the grade table")?;

        Ok(parse_grade_table(&table_html))
    }
}

#[async_trait]
impl GradeSource for PortalFetcher {
    async fn fetch(&self) -> GradeSnapshot {
        let (Some(student_id), Some(password)) = (&self.config.student_id, &self.config.password) else {
            error!("STU_ID or STU_PWD is not set, skipping the portal login");
            return Vec::new();
        };

        info!("Logging into the academic portal...");
        let driver = match self.connect().await {
            Ok(driver) => driver,
            Err(e) => {
                error!("Scraping failed: {:#}", e);
                return Vec::new();
            }
        };

        let result = self.scrape(&driver, student_id, password).await;

        // The browser goes away on every path.
        if let Err(e) = driver.quit().await {
            warn!("Failed to quit browser: {}", e);
        }

        match result {
            Ok(grades) => {
                info!("Read {} rows from the grade table", grades.len());
                grades
            }
            Err(e) => {
                error!("Scraping failed: {:#}", e);
                Vec::new()
            }
        }
    }
}

// Clicking the grades link opens a new tab; wait until its handle shows up.
async fn wait_for_new_window(driver: &WebDriver, known: &[WindowHandle], timeout: Duration) -> Result<WindowHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        let handles = driver.windows().await.context("Failed to list browser windows")?;
        if let Some(handle) = handles.into_iter().find(|h| !known.contains(h)) {
            return Ok(handle);
        }
        if Instant::now() >= deadline {
            bail!("Grades tab did not open within {}s", timeout.as_secs());
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Extracts course name and grade from every `tr.jqgrow` row.
///
/// Cells are matched by their `aria-describedby` column key, not by position. A cell's
/// `title` attribute wins over its text because the grid truncates long names.
pub fn parse_grade_table(html: &str) -> GradeSnapshot {
    let document = Html::parse_document(html);
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr.jqgrow"), Selector::parse("td")) else {
        return Vec::new();
    };

    let mut grades = Vec::new();
    for row in document.select(&row_selector) {
        let mut record = GradeRecord::default();
        for td in row.select(&cell_selector) {
            let column = td.value().attr("aria-describedby").unwrap_or("");
            if column != COURSE_COLUMN && column != GRADE_COLUMN {
                continue;
            }
            let value = match td.value().attr("title") {
                Some(title) => title.to_string(),
                None => td.text().map(str::trim).collect::<String>(),
            };
            if column == COURSE_COLUMN {
                record.course = value;
            } else {
                record.grade = value;
            }
        }
        grades.push(record);
    }

    grades
}
