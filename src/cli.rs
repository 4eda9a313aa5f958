use crate::output;
use crate::pipeline::{Pipeline, CLEAN_PREFIX, LISTINGS_PREFIX, REMAINING_PREFIX, URLS_PREFIX};
use crate::scrapers::urls::page_count;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Files offered per picker before the rest are summarized
const MAX_LISTED_FILES: usize = 10;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Line-based prompts over any reader/writer pair
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    /// Print `prompt` and read one trimmed line. End of input is an error.
    pub fn line(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("Input closed");
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the answer is one of `choices`
    pub fn choice(&mut self, prompt: &str, choices: &[&str]) -> Result<String> {
        loop {
            let answer = self.line(prompt)?;
            if choices.contains(&answer.as_str()) {
                return Ok(answer);
            }
            self.say(&format!("❌ Invalid choice. Please enter one of: {}\n", choices.join(", ")))?;
        }
    }

    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.choice(prompt, &["y", "n", "Y", "N"])?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    /// Ask until the answer is a number in `min..=max`. An empty answer takes `default`.
    pub fn number(&mut self, prompt: &str, min: u32, max: Option<u32>, default: Option<u32>) -> Result<u32> {
        loop {
            let answer = self.line(prompt)?;
            if answer.is_empty() {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            let Ok(value) = answer.parse::<u32>() else {
                self.say("❌ Please enter a valid number\n")?;
                continue;
            };
            if value < min {
                self.say(&format!("❌ Please enter a number >= {}\n", min))?;
                continue;
            }
            if let Some(max) = max.filter(|max| value > *max) {
                self.say(&format!("❌ Please enter a number <= {}\n", max))?;
                continue;
            }
            return Ok(value);
        }
    }

    /// Ask until the answer is an http(s) URL. An empty answer takes `default`.
    pub fn url(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        loop {
            let answer = match default {
                Some(default) => {
                    let answer = self.line(&format!("{} (default: {})\nURL: ", prompt, default))?;
                    if answer.is_empty() {
                        return Ok(default.to_string());
                    }
                    answer
                }
                None => self.line(prompt)?,
            };

            if answer.starts_with("http://") || answer.starts_with("https://") {
                return Ok(answer);
            }
            self.say("❌ URL must start with http:// or https://\n")?;
        }
    }

    /// Pick one of `files` by number, or 0 to type a path
    pub fn pick_file(&mut self, files: &[PathBuf]) -> Result<Option<PathBuf>> {
        if files.is_empty() {
            self.say("\n❌ No CSV files found.")?;
            if !self.confirm("Enter a CSV path manually? (y/n): ")? {
                return Ok(None);
            }
            return self.existing_path();
        }

        self.say(&format!("\nFound {} CSV file(s):\n", files.len()))?;
        let shown = files.len().min(MAX_LISTED_FILES);
        for (i, file) in files.iter().take(shown).enumerate() {
            let size_kb = std::fs::metadata(file).map(|m| m.len() as f64 / 1024.0).unwrap_or(0.0);
            self.say(&format!("  {}. {} ({:.1} KB)", i + 1, display_name(file), size_kb))?;
        }
        if files.len() > shown {
            self.say(&format!("  ... and {} more", files.len() - shown))?;
        }
        self.say("\n  0. Enter custom path")?;
        self.say(SEPARATOR)?;

        let choice = self.number(&format!("\nSelect CSV file (0-{}): ", shown), 0, Some(shown as u32), None)?;
        if choice == 0 {
            return self.existing_path();
        }
        Ok(Some(files[choice as usize - 1].clone()))
    }

    fn existing_path(&mut self) -> Result<Option<PathBuf>> {
        let path = PathBuf::from(self.line("\nEnter CSV file path: ")?);
        if path.exists() {
            Ok(Some(path))
        } else {
            self.say(&format!("\n❌ File not found: {}\n", path.display()))?;
            Ok(None)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Base URL with a page placeholder, asking the user to add one if it is missing
fn ask_base_url<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, default: &str) -> Result<String> {
    prompt.say("\nURL Configuration:")?;
    prompt.say("  1. Use default")?;
    prompt.say("  2. Enter custom URL")?;

    if prompt.choice("\nChoice (1-2): ", &["1", "2"])? == "1" {
        prompt.say(&format!("\n✓ Using: {}", default))?;
        return Ok(default.to_string());
    }

    prompt.say("\n💡 Your URL should contain {} where the page number goes")?;
    prompt.say("   Example: https://example.com/listings?page={}")?;
    let mut base_url = prompt.url("\nEnter base URL: ", None)?;

    if !base_url.contains("{}") {
        prompt.say("\n⚠️  URL doesn't contain {} for page numbers, page=N will be added as a query parameter")?;
        if prompt.confirm("Add ?page={} to the end instead? (y/n): ")? {
            base_url.push_str(if base_url.contains('?') { "&page={}" } else { "?page={}" });
        }
    }
    Ok(base_url)
}

/// Base URL and listing count for a crawl, or `None` if the user backs out
fn ask_crawl<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<Option<(String, u32)>> {
    let config = pipeline.config();
    let base_url = ask_base_url(prompt, &config.base_url)?;
    prompt.say(SEPARATOR)?;

    let total = prompt.number("\nHow many listings should be collected? ", 1, None, None)?;
    let pages = page_count(total, config.page_size);

    prompt.say("\n📊 Summary:")?;
    prompt.say(&format!("   • Base URL: {}", base_url))?;
    prompt.say(&format!("   • Listings: {}", total))?;
    prompt.say(&format!("   • Pages: {} ({} listings per page)", pages, config.page_size))?;

    if prompt.confirm("\nProceed? (y/n): ")? {
        Ok(Some((base_url, total)))
    } else {
        prompt.say("\n❌ Cancelled\n")?;
        Ok(None)
    }
}

/// Collected URL files, then remaining-URL files
fn url_files(pipeline: &Pipeline) -> Result<Vec<PathBuf>> {
    let dir = pipeline.config().urls_dir();
    let mut files = output::list_csv_files(&dir, URLS_PREFIX)?;
    files.extend(output::list_csv_files(&dir, REMAINING_PREFIX)?);
    Ok(files)
}

/// Detail files, then cleaned files
fn cleanable_files(pipeline: &Pipeline) -> Result<Vec<PathBuf>> {
    let config = pipeline.config();
    let mut files = output::list_csv_files(&config.data_dir(), LISTINGS_PREFIX)?;
    files.extend(output::list_csv_files(&config.clean_dir(), CLEAN_PREFIX)?);
    Ok(files)
}

fn ask_filter<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>) -> Result<bool> {
    prompt.confirm("\nDrop adverts that look like sales or short stays? (y/n): ")
}

async fn full_pipeline<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    prompt.say("\n📋 FULL PIPELINE\n")?;
    prompt.say("Collect listing URLs, extract their details and clean the result")?;
    prompt.say(SEPARATOR)?;

    let Some((base_url, total)) = ask_crawl(prompt, pipeline)? else {
        return Ok(());
    };
    let long_term_only = ask_filter(prompt)?;

    match pipeline.run_all(&base_url, total, long_term_only).await? {
        Some(path) => prompt.say(&format!("\n✅ Cleaned data saved to {}\n", path.display())),
        None => prompt.say("\n⚠️  Nothing was scraped\n"),
    }
}

async fn collect_urls<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    prompt.say("\n📋 URL COLLECTION\n")?;
    prompt.say("Collect listing URLs from search result pages")?;
    prompt.say(SEPARATOR)?;

    let Some((base_url, total)) = ask_crawl(prompt, pipeline)? else {
        return Ok(());
    };

    let (path, records) = pipeline.collect_urls(&base_url, total).await?;
    prompt.say(&format!("\n✅ {} URLs saved to {}\n", records.len(), path.display()))
}

async fn extract_details<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    prompt.say("\n📋 LISTING EXTRACTION\n")?;
    prompt.say("Extract detailed information from collected listing URLs")?;
    prompt.say(SEPARATOR)?;

    let files = url_files(pipeline)?;
    let Some(path) = prompt.pick_file(&files)? else {
        return Ok(());
    };

    if let Ok(urls) = output::read_url_records(&path) {
        prompt.say(&format!("\n📊 This CSV contains {} URL(s)", urls.len()))?;
    }
    prompt.say(&format!("\n✓ Selected: {}", display_name(&path)))?;
    if !prompt.confirm("\nProceed? (y/n): ")? {
        return prompt.say("\n❌ Cancelled\n");
    }

    let (out, listings) = pipeline.extract_details(&path).await?;
    prompt.say(&format!("\n✅ {} listings saved to {}\n", listings.len(), out.display()))
}

fn clean_listings<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    prompt.say("\n📋 DATA CLEANING\n")?;
    prompt.say("Clean an extracted listings file, or clean a cleaned file again")?;
    prompt.say(SEPARATOR)?;

    let files = cleanable_files(pipeline)?;
    let Some(path) = prompt.pick_file(&files)? else {
        return Ok(());
    };
    let long_term_only = ask_filter(prompt)?;

    let (out, table) = pipeline.clean_file(&path, long_term_only)?;
    prompt.say(&format!("\n✅ {} cleaned listings saved to {}\n", table.len(), out.display()))
}

fn remaining_urls<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    prompt.say("\n📋 REMAINING URLS\n")?;
    prompt.say("Find URLs that an interrupted extraction did not reach")?;
    prompt.say(SEPARATOR)?;

    prompt.say("\nURL file:")?;
    let urls = url_files(pipeline)?;
    let Some(urls_file) = prompt.pick_file(&urls)? else {
        return Ok(());
    };

    prompt.say("\nListing file:")?;
    let listings = output::list_csv_files(&pipeline.config().data_dir(), LISTINGS_PREFIX)?;
    let Some(listings_file) = prompt.pick_file(&listings)? else {
        return Ok(());
    };

    match pipeline.remaining_urls(&urls_file, &listings_file)? {
        Some(path) => {
            prompt.say(&format!("\n✅ Remaining URLs saved to {}", path.display()))?;
            prompt.say("📝 Next step: run the listing extraction with this file\n")
        }
        None => prompt.say("\n🎉 All URLs have been scraped!\n"),
    }
}

/// Interactive menu loop on the given reader/writer
pub async fn run_with<R: BufRead, W: Write>(mut prompt: Prompt<R, W>, pipeline: &Pipeline) -> Result<()> {
    loop {
        prompt.say("\n============================================================")?;
        prompt.say("🕷️ LISTING SCOUT")?;
        prompt.say("============================================================\n")?;
        prompt.say("What would you like to run?\n")?;
        prompt.say("  1. 🚀 Full pipeline    - Collect, extract and clean")?;
        prompt.say("  2. 🔗 Collect URLs     - Collect listing URLs from search pages")?;
        prompt.say("  3. 📝 Extract details  - Extract details from collected URLs")?;
        prompt.say("  4. 🧹 Clean data       - Normalize an extracted listings file")?;
        prompt.say("  5. 🔁 Remaining URLs   - URLs an interrupted extraction missed")?;
        prompt.say("  6. ❌ Exit\n")?;
        prompt.say(SEPARATOR)?;

        let choice = prompt.choice("\nEnter your choice (1-6): ", &["1", "2", "3", "4", "5", "6"])?;
        let result = match choice.as_str() {
            "1" => full_pipeline(&mut prompt, pipeline).await,
            "2" => collect_urls(&mut prompt, pipeline).await,
            "3" => extract_details(&mut prompt, pipeline).await,
            "4" => clean_listings(&mut prompt, pipeline),
            "5" => remaining_urls(&mut prompt, pipeline),
            _ => break,
        };

        if let Err(e) = result {
            prompt.say(&format!("\n❌ Error: {:#}\n", e))?;
        }

        prompt.say(SEPARATOR)?;
        if !prompt.confirm("\nRun something else? (y/n): ")? {
            break;
        }
    }

    prompt.say("\n👋 Goodbye!\n")
}

/// Interactive menu on stdin/stdout
pub async fn run(pipeline: &Pipeline) -> Result<()> {
    let prompt = Prompt::new(io::stdin().lock(), io::stdout());
    run_with(prompt, pipeline).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scrapers::SiteSelectors;
    use std::io::Cursor;

    fn prompt(input: &str) -> Prompt<Cursor<Vec<u8>>, Vec<u8>> {
        Prompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn printed(prompt: &Prompt<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&prompt.output).to_string()
    }

    #[test]
    fn choice_repeats_until_valid() {
        let mut p = prompt("9\nx\n2\n");
        assert_eq!(p.choice("> ", &["1", "2"]).unwrap(), "2");
        assert_eq!(printed(&p).matches("Invalid choice").count(), 2);
    }

    #[test]
    fn number_enforces_bounds_and_default() {
        let mut p = prompt("abc\n0\n11\n7\n\n");
        assert_eq!(p.number("> ", 1, Some(10), None).unwrap(), 7);
        assert_eq!(p.number("> ", 1, None, Some(3)).unwrap(), 3);

        let out = printed(&p);
        assert!(out.contains("valid number"));
        assert!(out.contains(">= 1"));
        assert!(out.contains("<= 10"));
    }

    #[test]
    fn url_requires_http_scheme() {
        let mut p = prompt("jiji.com.gh\nhttps://jiji.com.gh/x?page={}\n");
        assert_eq!(p.url("URL: ", None).unwrap(), "https://jiji.com.gh/x?page={}");

        let mut p = prompt("\n");
        assert_eq!(p.url("URL", Some("https://default.test")).unwrap(), "https://default.test");
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut p = prompt("");
        assert!(p.line("> ").is_err());
    }

    #[test]
    fn custom_base_url_gets_placeholder() {
        let mut p = prompt("2\nhttps://example.com/rent?sort=new\ny\n");
        let url = ask_base_url(&mut p, "https://default.test?page={}").unwrap();
        assert_eq!(url, "https://example.com/rent?sort=new&page={}");
    }

    #[test]
    fn pick_file_by_number() {
        let files = vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")];
        let mut p = prompt("3\n2\n");
        assert_eq!(p.pick_file(&files).unwrap(), Some(PathBuf::from("b.csv")));
    }

    #[test]
    fn pick_file_with_nothing_listed() {
        let mut p = prompt("n\n");
        assert_eq!(p.pick_file(&[]).unwrap(), None);
    }

    #[test]
    fn pickers_offer_follow_up_files() {
        let config = Config {
            output_dir: std::env::temp_dir().join(format!("listing-scout-cli-{}", std::process::id())),
            ..Config::default()
        };
        for path in [
            config.urls_dir().join("listingURLS_20260101_120000.csv"),
            config.urls_dir().join("remaining_urls_20260101_130000.csv"),
            config.data_dir().join("listings_20260101_120000.csv"),
            config.clean_dir().join("listings_clean_20260101_120000.csv"),
        ] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "url\n").unwrap();
        }
        let output_dir = config.output_dir.clone();
        let pipeline = Pipeline::new(config, SiteSelectors::default());

        let names = |files: Vec<PathBuf>| files.iter().map(|f| display_name(f)).collect::<Vec<_>>();
        assert_eq!(
            names(url_files(&pipeline).unwrap()),
            vec!["listingURLS_20260101_120000.csv", "remaining_urls_20260101_130000.csv"]
        );
        assert_eq!(
            names(cleanable_files(&pipeline).unwrap()),
            vec!["listings_20260101_120000.csv", "listings_clean_20260101_120000.csv"]
        );
        std::fs::remove_dir_all(&output_dir).unwrap();
    }

    #[tokio::test]
    async fn menu_exits() {
        let pipeline = Pipeline::new(Config::default(), SiteSelectors::default());
        let mut output = Vec::new();
        let p = Prompt::new(Cursor::new(b"6\n".to_vec()), &mut output);

        run_with(p, &pipeline).await.unwrap();

        assert!(String::from_utf8_lossy(&output).contains("Goodbye"));
    }
}
